use axum::{
    async_trait,
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use utoipa::IntoParams;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::Actor,
    config::AppConfig,
    errors::ServiceError,
    models::EntityKind,
    services::queries::ListFilter,
    store::Record,
    ApiResponse, AppState, PaginatedResponse,
};

/// Standard success response
pub fn success_response<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(ApiResponse::success(data))).into_response()
}

/// Standard created response
pub fn created_response<T: Serialize>(data: T) -> Response {
    (StatusCode::CREATED, Json(ApiResponse::success(data))).into_response()
}

/// Validate request input
pub fn validate_input<T: Validate>(input: &T) -> Result<(), ServiceError> {
    input
        .validate()
        .map_err(|e| ServiceError::ValidationError(format!("Validation failed: {}", e)))
}

/// JSON body extractor whose rejections are `400 validation_error` bodies.
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ServiceError::ValidationError(rejection.body_text()))?;
        Ok(Self(value))
    }
}

/// Query parameters accepted by every list endpoint
#[derive(Debug, Default, Deserialize, Serialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListQuery {
    /// Status name, e.g. `submitted`
    pub status: Option<String>,
    pub supplier_id: Option<Uuid>,
    pub rfq_id: Option<Uuid>,
    pub purchase_order_id: Option<Uuid>,
    pub invoice_id: Option<Uuid>,
    #[validate(range(min = 1, message = "page starts at 1"))]
    pub page: Option<u64>,
    #[validate(range(min = 1, message = "per_page must be at least 1"))]
    pub per_page: Option<u64>,
}

impl ListQuery {
    pub fn filter(&self) -> ListFilter {
        ListFilter {
            status: self.status.clone(),
            supplier_id: self.supplier_id,
            rfq_id: self.rfq_id,
            purchase_order_id: self.purchase_order_id,
            invoice_id: self.invoice_id,
            created_from: None,
            created_to: None,
        }
    }

    /// `(page, per_page)` with configured defaults and the per-page ceiling applied.
    pub fn pagination(&self, config: &AppConfig) -> (u64, u64) {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self
            .per_page
            .unwrap_or(u64::from(config.api_default_page_size))
            .clamp(1, u64::from(config.api_max_page_size).max(1));
        (page, per_page)
    }
}

pub fn paginate<T>(all: Vec<T>, page: u64, per_page: u64) -> PaginatedResponse<T> {
    let total = all.len() as u64;
    let offset = page.saturating_sub(1).saturating_mul(per_page);
    let items = all
        .into_iter()
        .skip(usize::try_from(offset).unwrap_or(usize::MAX))
        .take(usize::try_from(per_page).unwrap_or(usize::MAX))
        .collect();
    PaginatedResponse::new(items, page, per_page, total)
}

/// Lists one entity kind for the actor and converts the records to `T`.
pub async fn list_typed<T>(
    state: &AppState,
    actor: &Actor,
    kind: EntityKind,
    query: &ListQuery,
) -> Result<PaginatedResponse<T>, ServiceError>
where
    T: TryFrom<Record, Error = ServiceError>,
{
    validate_input(query)?;
    let records = state
        .queries
        .list_entities(actor, kind, &query.filter())
        .await?;
    let typed = records
        .into_iter()
        .map(T::try_from)
        .collect::<Result<Vec<T>, _>>()?;
    let (page, per_page) = query.pagination(&state.config);
    Ok(paginate(typed, page, per_page))
}

/// Fetches one entity visible to the actor as `T`.
pub async fn get_typed<T>(
    state: &AppState,
    actor: &Actor,
    kind: EntityKind,
    id: Uuid,
) -> Result<T, ServiceError>
where
    T: TryFrom<Record, Error = ServiceError>,
{
    let record = state.queries.get_entity(actor, kind, id).await?;
    T::try_from(record)
}
