use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::common::{
    created_response, get_typed, list_typed, success_response, ApiJson, ListQuery,
};
use crate::{
    auth::AuthenticatedActor,
    commands::{
        quotations::SubmitQuotationCommand,
        rfqs::{CloseRfqCommand, CreateRfqCommand},
    },
    errors::ServiceError,
    models::{DocumentRef, EntityKind, Quotation, Rfq},
    AppState,
};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateRfqRequest {
    #[schema(example = "Office Supplies")]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub requirements: Vec<String>,
    pub deadline: NaiveDate,
    pub invited_supplier_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SubmitQuotationRequest {
    pub supplier_id: Uuid,
    #[schema(value_type = String, example = "5800.00")]
    pub price: Decimal,
    /// Defaults to the configured currency
    pub currency: Option<String>,
    pub delivery_days: u32,
    #[serde(default)]
    pub conditions: String,
    #[serde(default)]
    pub documents: Vec<DocumentRef>,
}

pub fn rfq_routes() -> Router<AppState> {
    Router::new()
        .route("/rfqs", post(create_rfq).get(list_rfqs))
        .route("/rfqs/:id", get(get_rfq))
        .route("/rfqs/:id/close", post(close_rfq))
        .route("/rfqs/:id/quotations", post(submit_quotation))
}

/// Open an RFQ and invite suppliers
#[utoipa::path(
    post,
    path = "/api/v1/rfqs",
    request_body = CreateRfqRequest,
    responses(
        (status = 201, description = "RFQ opened", body = crate::ApiResponse<Rfq>),
        (status = 400, description = "Invalid request, past deadline or non-approved invitee", body = crate::errors::ErrorResponse),
        (status = 403, description = "Role may not create RFQs", body = crate::errors::ErrorResponse)
    ),
    tag = "rfqs",
    security(("bearer_auth" = []))
)]
pub async fn create_rfq(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    ApiJson(payload): ApiJson<CreateRfqRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let rfq = state
        .workflow
        .create_rfq(CreateRfqCommand {
            actor,
            title: payload.title,
            description: payload.description,
            requirements: payload.requirements,
            deadline: payload.deadline,
            invited_supplier_ids: payload.invited_supplier_ids,
        })
        .await?;
    Ok(created_response(rfq))
}

/// List RFQs
#[utoipa::path(
    get,
    path = "/api/v1/rfqs",
    params(ListQuery),
    responses(
        (status = 200, description = "RFQs visible to the caller", body = crate::ApiResponse<crate::PaginatedResponse<Rfq>>)
    ),
    tag = "rfqs",
    security(("bearer_auth" = []))
)]
pub async fn list_rfqs(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let page = list_typed::<Rfq>(&state, &actor, EntityKind::Rfq, &query).await?;
    Ok(success_response(page))
}

/// Get an RFQ by ID
#[utoipa::path(
    get,
    path = "/api/v1/rfqs/{id}",
    params(("id" = Uuid, Path, description = "RFQ ID")),
    responses(
        (status = 200, description = "RFQ fetched", body = crate::ApiResponse<Rfq>),
        (status = 404, description = "RFQ not found", body = crate::errors::ErrorResponse)
    ),
    tag = "rfqs",
    security(("bearer_auth" = []))
)]
pub async fn get_rfq(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let rfq = get_typed::<Rfq>(&state, &actor, EntityKind::Rfq, id).await?;
    Ok(success_response(rfq))
}

/// Close an open RFQ
#[utoipa::path(
    post,
    path = "/api/v1/rfqs/{id}/close",
    params(("id" = Uuid, Path, description = "RFQ ID")),
    responses(
        (status = 200, description = "RFQ closed", body = crate::ApiResponse<Rfq>),
        (status = 403, description = "Role may not close RFQs", body = crate::errors::ErrorResponse),
        (status = 422, description = "RFQ is not open", body = crate::errors::ErrorResponse)
    ),
    tag = "rfqs",
    security(("bearer_auth" = []))
)]
pub async fn close_rfq(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(rfq_id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let rfq = state
        .workflow
        .close_rfq(CloseRfqCommand { actor, rfq_id })
        .await?;
    Ok(success_response(rfq))
}

/// Submit a quotation for an RFQ
#[utoipa::path(
    post,
    path = "/api/v1/rfqs/{id}/quotations",
    params(("id" = Uuid, Path, description = "RFQ ID")),
    request_body = SubmitQuotationRequest,
    responses(
        (status = 201, description = "Quotation submitted", body = crate::ApiResponse<Quotation>),
        (status = 400, description = "Invalid quotation or supplier not invited", body = crate::errors::ErrorResponse),
        (status = 403, description = "Not the supplier's owner", body = crate::errors::ErrorResponse),
        (status = 409, description = "Supplier already quoted this RFQ", body = crate::errors::ErrorResponse),
        (status = 422, description = "RFQ no longer accepts quotations", body = crate::errors::ErrorResponse)
    ),
    tag = "rfqs",
    security(("bearer_auth" = []))
)]
pub async fn submit_quotation(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(rfq_id): Path<Uuid>,
    ApiJson(payload): ApiJson<SubmitQuotationRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let quotation = state
        .workflow
        .submit_quotation(SubmitQuotationCommand {
            actor,
            rfq_id,
            supplier_id: payload.supplier_id,
            price: payload.price,
            currency: payload
                .currency
                .unwrap_or_else(|| state.config.default_currency.clone()),
            delivery_days: payload.delivery_days,
            conditions: payload.conditions,
            documents: payload.documents,
        })
        .await?;
    Ok(created_response(quotation))
}
