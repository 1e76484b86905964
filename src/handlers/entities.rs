use std::str::FromStr;

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::get,
    Router,
};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use super::common::{paginate, success_response, validate_input, ListQuery};
use crate::{
    auth::AuthenticatedActor, errors::ServiceError, models::EntityKind, store::Record, AppState,
};

/// Creation-date bounds for the generic listing
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CreatedRange {
    pub created_from: Option<NaiveDate>,
    pub created_to: Option<NaiveDate>,
}

impl CreatedRange {
    /// Both ends are whole days: `created_from` from its first instant, `created_to`
    /// through its last.
    fn bounds(&self) -> Result<(Option<DateTime<Utc>>, Option<DateTime<Utc>>), ServiceError> {
        if let (Some(from), Some(to)) = (self.created_from, self.created_to) {
            if from > to {
                return Err(ServiceError::ValidationError(
                    "created_from is after created_to".to_string(),
                ));
            }
        }
        let from = self
            .created_from
            .map(|day| day_instant(day, 0, 0, 0, 0))
            .transpose()?;
        let to = self
            .created_to
            .map(|day| day_instant(day, 23, 59, 59, 999_999_999))
            .transpose()?;
        Ok((from, to))
    }
}

fn day_instant(
    day: NaiveDate,
    hour: u32,
    min: u32,
    sec: u32,
    nano: u32,
) -> Result<DateTime<Utc>, ServiceError> {
    day.and_hms_nano_opt(hour, min, sec, nano)
        .map(|naive| Utc.from_utc_datetime(&naive))
        .ok_or_else(|| ServiceError::ValidationError(format!("invalid date bound {}", day)))
}

fn parse_kind(raw: &str) -> Result<EntityKind, ServiceError> {
    EntityKind::from_str(raw)
        .map_err(|_| ServiceError::ValidationError(format!("unknown entity kind '{}'", raw)))
}

pub fn entity_routes() -> Router<AppState> {
    Router::new()
        .route("/entities/:kind", get(list_entities))
        .route("/entities/:kind/:id", get(get_entity))
}

/// List records of any stored kind
#[utoipa::path(
    get,
    path = "/api/v1/entities/{kind}",
    params(
        ("kind" = String, Path, description = "Entity kind, e.g. `purchase_order`"),
        ListQuery,
        CreatedRange
    ),
    responses(
        (status = 200, description = "Records visible to the caller", body = crate::ApiResponse<crate::PaginatedResponse<Record>>),
        (status = 400, description = "Unknown kind or status", body = crate::errors::ErrorResponse)
    ),
    tag = "entities",
    security(("bearer_auth" = []))
)]
pub async fn list_entities(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(kind): Path<String>,
    Query(query): Query<ListQuery>,
    Query(range): Query<CreatedRange>,
) -> Result<impl IntoResponse, ServiceError> {
    let kind = parse_kind(&kind)?;
    validate_input(&query)?;
    let (created_from, created_to) = range.bounds()?;

    let mut filter = query.filter();
    filter.created_from = created_from;
    filter.created_to = created_to;

    let records = state.queries.list_entities(&actor, kind, &filter).await?;
    let (page, per_page) = query.pagination(&state.config);
    Ok(success_response(paginate(records, page, per_page)))
}

/// Get one record of any stored kind
#[utoipa::path(
    get,
    path = "/api/v1/entities/{kind}/{id}",
    params(
        ("kind" = String, Path, description = "Entity kind"),
        ("id" = Uuid, Path, description = "Entity ID")
    ),
    responses(
        (status = 200, description = "Record fetched", body = crate::ApiResponse<Record>),
        (status = 400, description = "Unknown kind", body = crate::errors::ErrorResponse),
        (status = 403, description = "Record belongs to another supplier", body = crate::errors::ErrorResponse),
        (status = 404, description = "Record not found", body = crate::errors::ErrorResponse)
    ),
    tag = "entities",
    security(("bearer_auth" = []))
)]
pub async fn get_entity(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path((kind, id)): Path<(String, Uuid)>,
) -> Result<impl IntoResponse, ServiceError> {
    let kind = parse_kind(&kind)?;
    let record = state.queries.get_entity(&actor, kind, id).await?;
    Ok(success_response(record))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn kinds_parse_from_snake_case() {
        assert_eq!(parse_kind("purchase_order").unwrap(), EntityKind::PurchaseOrder);
        assert_eq!(parse_kind("rfq").unwrap(), EntityKind::Rfq);
        assert_matches!(parse_kind("order"), Err(ServiceError::ValidationError(_)));
    }

    #[test]
    fn created_range_covers_whole_days() {
        let range = CreatedRange {
            created_from: NaiveDate::from_ymd_opt(2026, 3, 1),
            created_to: NaiveDate::from_ymd_opt(2026, 3, 1),
        };
        let (from, to) = range.bounds().unwrap();
        assert_eq!(from.unwrap().to_rfc3339(), "2026-03-01T00:00:00+00:00");
        let to = to.unwrap();
        assert_eq!(to.date_naive(), NaiveDate::from_ymd_opt(2026, 3, 1).unwrap());
        assert!(to > Utc.with_ymd_and_hms(2026, 3, 1, 23, 59, 59).unwrap());

        let reversed = CreatedRange {
            created_from: NaiveDate::from_ymd_opt(2026, 3, 2),
            created_to: NaiveDate::from_ymd_opt(2026, 3, 1),
        };
        assert_matches!(reversed.bounds(), Err(ServiceError::ValidationError(_)));
    }
}
