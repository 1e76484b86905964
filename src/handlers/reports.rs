use std::str::FromStr;

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::get,
    Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use utoipa::IntoParams;

use super::common::success_response;
use crate::{
    auth::AuthenticatedActor,
    errors::ServiceError,
    services::analytics::{DashboardStats, DateRange, Report, ReportKind},
    AppState,
};

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ReportQuery {
    /// First purchase order creation date included
    pub from: Option<NaiveDate>,
    /// Last purchase order creation date included
    pub to: Option<NaiveDate>,
}

pub fn report_routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(get_dashboard))
        .route("/reports/:kind", get(get_report))
}

/// Dashboard counters for the caller
#[utoipa::path(
    get,
    path = "/api/v1/dashboard",
    responses(
        (status = 200, description = "Dashboard computed", body = crate::ApiResponse<DashboardStats>),
        (status = 401, description = "Missing or invalid token", body = crate::errors::ErrorResponse)
    ),
    tag = "reports",
    security(("bearer_auth" = []))
)]
pub async fn get_dashboard(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
) -> Result<impl IntoResponse, ServiceError> {
    let stats = state.analytics.dashboard_stats(&actor).await?;
    Ok(success_response(stats))
}

/// Purchase order, invoice and payment totals grouped by provider, month or status
#[utoipa::path(
    get,
    path = "/api/v1/reports/{kind}",
    params(
        ("kind" = String, Path, description = "`by_provider`, `by_month` or `by_status`"),
        ReportQuery
    ),
    responses(
        (status = 200, description = "Report generated", body = crate::ApiResponse<Report>),
        (status = 400, description = "Unknown report kind or inverted range", body = crate::errors::ErrorResponse),
        (status = 403, description = "Role may not view reports", body = crate::errors::ErrorResponse)
    ),
    tag = "reports",
    security(("bearer_auth" = []))
)]
pub async fn get_report(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(kind): Path<String>,
    Query(query): Query<ReportQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let kind = ReportKind::from_str(&kind)
        .map_err(|_| ServiceError::ValidationError(format!("unknown report kind '{}'", kind)))?;
    let range = DateRange::new(query.from, query.to)?;
    let report = state.analytics.report(&actor, kind, range).await?;
    Ok(success_response(report))
}
