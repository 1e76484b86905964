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
        invoices::SubmitInvoiceCommand,
        purchaseorders::{
            CancelPurchaseOrderCommand, ConfirmPurchaseOrderCommand, MarkDeliveredCommand,
            SendPurchaseOrderCommand,
        },
    },
    errors::ServiceError,
    models::{DocumentRef, EntityKind, Invoice, PurchaseOrder},
    AppState,
};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CancelPurchaseOrderRequest {
    pub reason: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SubmitInvoiceRequest {
    #[schema(example = "F-2026-0001")]
    pub invoice_number: String,
    #[schema(value_type = String, example = "5800.00")]
    pub amount: Decimal,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    #[serde(default)]
    pub documents: Vec<DocumentRef>,
}

pub fn purchase_order_routes() -> Router<AppState> {
    Router::new()
        .route("/purchase-orders", get(list_purchase_orders))
        .route("/purchase-orders/:id", get(get_purchase_order))
        .route("/purchase-orders/:id/send", post(send_purchase_order))
        .route("/purchase-orders/:id/confirm", post(confirm_purchase_order))
        .route("/purchase-orders/:id/deliver", post(mark_delivered))
        .route("/purchase-orders/:id/cancel", post(cancel_purchase_order))
        .route("/purchase-orders/:id/invoices", post(submit_invoice))
}

/// List purchase orders
#[utoipa::path(
    get,
    path = "/api/v1/purchase-orders",
    params(ListQuery),
    responses(
        (status = 200, description = "Purchase orders visible to the caller", body = crate::ApiResponse<crate::PaginatedResponse<PurchaseOrder>>)
    ),
    tag = "purchase-orders",
    security(("bearer_auth" = []))
)]
pub async fn list_purchase_orders(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let page =
        list_typed::<PurchaseOrder>(&state, &actor, EntityKind::PurchaseOrder, &query).await?;
    Ok(success_response(page))
}

/// Get a purchase order by ID
#[utoipa::path(
    get,
    path = "/api/v1/purchase-orders/{id}",
    params(("id" = Uuid, Path, description = "Purchase order ID")),
    responses(
        (status = 200, description = "Purchase order fetched", body = crate::ApiResponse<PurchaseOrder>),
        (status = 404, description = "Purchase order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "purchase-orders",
    security(("bearer_auth" = []))
)]
pub async fn get_purchase_order(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = get_typed::<PurchaseOrder>(&state, &actor, EntityKind::PurchaseOrder, id).await?;
    Ok(success_response(order))
}

/// Send a draft purchase order to the supplier
#[utoipa::path(
    post,
    path = "/api/v1/purchase-orders/{id}/send",
    params(("id" = Uuid, Path, description = "Purchase order ID")),
    responses(
        (status = 200, description = "Purchase order sent", body = crate::ApiResponse<PurchaseOrder>),
        (status = 422, description = "Purchase order is not a draft", body = crate::errors::ErrorResponse)
    ),
    tag = "purchase-orders",
    security(("bearer_auth" = []))
)]
pub async fn send_purchase_order(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(purchase_order_id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state
        .workflow
        .send_purchase_order(SendPurchaseOrderCommand {
            actor,
            purchase_order_id,
        })
        .await?;
    Ok(success_response(order))
}

/// Confirm a sent purchase order (supplier side)
#[utoipa::path(
    post,
    path = "/api/v1/purchase-orders/{id}/confirm",
    params(("id" = Uuid, Path, description = "Purchase order ID")),
    responses(
        (status = 200, description = "Purchase order confirmed", body = crate::ApiResponse<PurchaseOrder>),
        (status = 403, description = "Not the supplier's owner", body = crate::errors::ErrorResponse),
        (status = 422, description = "Purchase order was not sent", body = crate::errors::ErrorResponse)
    ),
    tag = "purchase-orders",
    security(("bearer_auth" = []))
)]
pub async fn confirm_purchase_order(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(purchase_order_id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state
        .workflow
        .confirm_purchase_order(ConfirmPurchaseOrderCommand {
            actor,
            purchase_order_id,
        })
        .await?;
    Ok(success_response(order))
}

/// Record delivery of a confirmed purchase order
#[utoipa::path(
    post,
    path = "/api/v1/purchase-orders/{id}/deliver",
    params(("id" = Uuid, Path, description = "Purchase order ID")),
    responses(
        (status = 200, description = "Purchase order delivered", body = crate::ApiResponse<PurchaseOrder>),
        (status = 422, description = "Purchase order was not confirmed", body = crate::errors::ErrorResponse)
    ),
    tag = "purchase-orders",
    security(("bearer_auth" = []))
)]
pub async fn mark_delivered(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(purchase_order_id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state
        .workflow
        .mark_delivered(MarkDeliveredCommand {
            actor,
            purchase_order_id,
        })
        .await?;
    Ok(success_response(order))
}

/// Cancel a purchase order before delivery
#[utoipa::path(
    post,
    path = "/api/v1/purchase-orders/{id}/cancel",
    params(("id" = Uuid, Path, description = "Purchase order ID")),
    request_body = CancelPurchaseOrderRequest,
    responses(
        (status = 200, description = "Purchase order cancelled", body = crate::ApiResponse<PurchaseOrder>),
        (status = 400, description = "Reason missing", body = crate::errors::ErrorResponse),
        (status = 422, description = "Purchase order already delivered or cancelled", body = crate::errors::ErrorResponse)
    ),
    tag = "purchase-orders",
    security(("bearer_auth" = []))
)]
pub async fn cancel_purchase_order(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(purchase_order_id): Path<Uuid>,
    ApiJson(payload): ApiJson<CancelPurchaseOrderRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state
        .workflow
        .cancel_purchase_order(CancelPurchaseOrderCommand {
            actor,
            purchase_order_id,
            reason: payload.reason,
        })
        .await?;
    Ok(success_response(order))
}

/// Submit an invoice for a delivered purchase order
#[utoipa::path(
    post,
    path = "/api/v1/purchase-orders/{id}/invoices",
    params(("id" = Uuid, Path, description = "Purchase order ID")),
    request_body = SubmitInvoiceRequest,
    responses(
        (status = 201, description = "Invoice submitted", body = crate::ApiResponse<Invoice>),
        (status = 400, description = "Invalid invoice", body = crate::errors::ErrorResponse),
        (status = 403, description = "Not the supplier's owner", body = crate::errors::ErrorResponse),
        (status = 409, description = "Invoice number already used", body = crate::errors::ErrorResponse),
        (status = 422, description = "Purchase order not delivered", body = crate::errors::ErrorResponse)
    ),
    tag = "purchase-orders",
    security(("bearer_auth" = []))
)]
pub async fn submit_invoice(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(purchase_order_id): Path<Uuid>,
    ApiJson(payload): ApiJson<SubmitInvoiceRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let invoice = state
        .workflow
        .submit_invoice(SubmitInvoiceCommand {
            actor,
            purchase_order_id,
            invoice_number: payload.invoice_number,
            amount: payload.amount,
            issue_date: payload.issue_date,
            due_date: payload.due_date,
            documents: payload.documents,
        })
        .await?;
    Ok(created_response(invoice))
}
