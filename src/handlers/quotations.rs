use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::common::{
    created_response, get_typed, list_typed, success_response, ApiJson, ListQuery,
};
use crate::{
    auth::AuthenticatedActor,
    commands::{
        purchaseorders::{GeneratePurchaseOrderCommand, LineItemInput},
        quotations::{ApproveQuotationCommand, ApproveQuotationResult, RejectQuotationCommand},
    },
    errors::ServiceError,
    models::{EntityKind, PurchaseOrder, Quotation},
    AppState,
};

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct RejectQuotationRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct GeneratePurchaseOrderRequest {
    /// Defaults to one line for the quoted price
    pub line_items: Option<Vec<LineItemInput>>,
    /// Defaults to today plus the quoted delivery days
    pub delivery_date: Option<NaiveDate>,
}

pub fn quotation_routes() -> Router<AppState> {
    Router::new()
        .route("/quotations", get(list_quotations))
        .route("/quotations/:id", get(get_quotation))
        .route("/quotations/:id/approve", post(approve_quotation))
        .route("/quotations/:id/reject", post(reject_quotation))
        .route("/quotations/:id/purchase-order", post(generate_purchase_order))
}

/// List quotations
#[utoipa::path(
    get,
    path = "/api/v1/quotations",
    params(ListQuery),
    responses(
        (status = 200, description = "Quotations visible to the caller", body = crate::ApiResponse<crate::PaginatedResponse<Quotation>>)
    ),
    tag = "quotations",
    security(("bearer_auth" = []))
)]
pub async fn list_quotations(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let page = list_typed::<Quotation>(&state, &actor, EntityKind::Quotation, &query).await?;
    Ok(success_response(page))
}

/// Get a quotation by ID
#[utoipa::path(
    get,
    path = "/api/v1/quotations/{id}",
    params(("id" = Uuid, Path, description = "Quotation ID")),
    responses(
        (status = 200, description = "Quotation fetched", body = crate::ApiResponse<Quotation>),
        (status = 404, description = "Quotation not found", body = crate::errors::ErrorResponse)
    ),
    tag = "quotations",
    security(("bearer_auth" = []))
)]
pub async fn get_quotation(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let quotation = get_typed::<Quotation>(&state, &actor, EntityKind::Quotation, id).await?;
    Ok(success_response(quotation))
}

/// Approve a quotation and award its RFQ
#[utoipa::path(
    post,
    path = "/api/v1/quotations/{id}/approve",
    params(("id" = Uuid, Path, description = "Quotation ID")),
    responses(
        (status = 200, description = "Quotation approved; competing quotations rejected", body = crate::ApiResponse<ApproveQuotationResult>),
        (status = 403, description = "Role may not review quotations", body = crate::errors::ErrorResponse),
        (status = 422, description = "Quotation not submitted or RFQ already awarded", body = crate::errors::ErrorResponse)
    ),
    tag = "quotations",
    security(("bearer_auth" = []))
)]
pub async fn approve_quotation(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(quotation_id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let result = state
        .workflow
        .approve_quotation(ApproveQuotationCommand {
            actor,
            quotation_id,
        })
        .await?;
    Ok(success_response(result))
}

/// Reject a quotation
#[utoipa::path(
    post,
    path = "/api/v1/quotations/{id}/reject",
    params(("id" = Uuid, Path, description = "Quotation ID")),
    request_body = RejectQuotationRequest,
    responses(
        (status = 200, description = "Quotation rejected", body = crate::ApiResponse<Quotation>),
        (status = 403, description = "Role may not review quotations", body = crate::errors::ErrorResponse),
        (status = 422, description = "Quotation already reviewed", body = crate::errors::ErrorResponse)
    ),
    tag = "quotations",
    security(("bearer_auth" = []))
)]
pub async fn reject_quotation(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(quotation_id): Path<Uuid>,
    payload: Option<ApiJson<RejectQuotationRequest>>,
) -> Result<impl IntoResponse, ServiceError> {
    let payload = payload.map(|ApiJson(p)| p).unwrap_or_default();
    let quotation = state
        .workflow
        .reject_quotation(RejectQuotationCommand {
            actor,
            quotation_id,
            reason: payload.reason,
        })
        .await?;
    Ok(success_response(quotation))
}

/// Generate a draft purchase order from an approved quotation
#[utoipa::path(
    post,
    path = "/api/v1/quotations/{id}/purchase-order",
    params(("id" = Uuid, Path, description = "Quotation ID")),
    request_body = GeneratePurchaseOrderRequest,
    responses(
        (status = 201, description = "Purchase order generated", body = crate::ApiResponse<PurchaseOrder>),
        (status = 403, description = "Role may not issue purchase orders", body = crate::errors::ErrorResponse),
        (status = 409, description = "Quotation already has a purchase order", body = crate::errors::ErrorResponse),
        (status = 422, description = "Quotation is not approved", body = crate::errors::ErrorResponse)
    ),
    tag = "quotations",
    security(("bearer_auth" = []))
)]
pub async fn generate_purchase_order(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(quotation_id): Path<Uuid>,
    payload: Option<ApiJson<GeneratePurchaseOrderRequest>>,
) -> Result<impl IntoResponse, ServiceError> {
    let payload = payload.map(|ApiJson(p)| p).unwrap_or_default();
    let order = state
        .workflow
        .generate_purchase_order(GeneratePurchaseOrderCommand {
            actor,
            quotation_id,
            line_items: payload.line_items,
            delivery_date: payload.delivery_date,
        })
        .await?;
    Ok(created_response(order))
}
