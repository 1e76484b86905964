use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::common::{
    created_response, get_typed, list_typed, success_response, ApiJson, ListQuery,
};
use crate::{
    auth::AuthenticatedActor,
    commands::{
        invoices::{ApproveInvoiceCommand, RejectInvoiceCommand},
        payments::{CreatePaymentPlanCommand, PlanSchedule},
    },
    errors::ServiceError,
    models::{EntityKind, Invoice, PaymentPlan},
    AppState,
};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RejectInvoiceRequest {
    pub reason: String,
}

pub fn invoice_routes() -> Router<AppState> {
    Router::new()
        .route("/invoices", get(list_invoices))
        .route("/invoices/:id", get(get_invoice))
        .route("/invoices/:id/approve", post(approve_invoice))
        .route("/invoices/:id/reject", post(reject_invoice))
        .route("/invoices/:id/payment-plan", post(create_payment_plan))
}

/// List invoices
#[utoipa::path(
    get,
    path = "/api/v1/invoices",
    params(ListQuery),
    responses(
        (status = 200, description = "Invoices visible to the caller", body = crate::ApiResponse<crate::PaginatedResponse<Invoice>>)
    ),
    tag = "invoices",
    security(("bearer_auth" = []))
)]
pub async fn list_invoices(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let page = list_typed::<Invoice>(&state, &actor, EntityKind::Invoice, &query).await?;
    Ok(success_response(page))
}

/// Get an invoice by ID
#[utoipa::path(
    get,
    path = "/api/v1/invoices/{id}",
    params(("id" = Uuid, Path, description = "Invoice ID")),
    responses(
        (status = 200, description = "Invoice fetched", body = crate::ApiResponse<Invoice>),
        (status = 404, description = "Invoice not found", body = crate::errors::ErrorResponse)
    ),
    tag = "invoices",
    security(("bearer_auth" = []))
)]
pub async fn get_invoice(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let invoice = get_typed::<Invoice>(&state, &actor, EntityKind::Invoice, id).await?;
    Ok(success_response(invoice))
}

/// Approve a pending invoice
#[utoipa::path(
    post,
    path = "/api/v1/invoices/{id}/approve",
    params(("id" = Uuid, Path, description = "Invoice ID")),
    responses(
        (status = 200, description = "Invoice approved", body = crate::ApiResponse<Invoice>),
        (status = 403, description = "Role may not review invoices", body = crate::errors::ErrorResponse),
        (status = 422, description = "Invoice is not pending", body = crate::errors::ErrorResponse)
    ),
    tag = "invoices",
    security(("bearer_auth" = []))
)]
pub async fn approve_invoice(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(invoice_id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let invoice = state
        .workflow
        .approve_invoice(ApproveInvoiceCommand { actor, invoice_id })
        .await?;
    Ok(success_response(invoice))
}

/// Reject a pending invoice
#[utoipa::path(
    post,
    path = "/api/v1/invoices/{id}/reject",
    params(("id" = Uuid, Path, description = "Invoice ID")),
    request_body = RejectInvoiceRequest,
    responses(
        (status = 200, description = "Invoice rejected", body = crate::ApiResponse<Invoice>),
        (status = 400, description = "Reason missing", body = crate::errors::ErrorResponse),
        (status = 422, description = "Invoice is not pending", body = crate::errors::ErrorResponse)
    ),
    tag = "invoices",
    security(("bearer_auth" = []))
)]
pub async fn reject_invoice(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(invoice_id): Path<Uuid>,
    ApiJson(payload): ApiJson<RejectInvoiceRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let invoice = state
        .workflow
        .reject_invoice(RejectInvoiceCommand {
            actor,
            invoice_id,
            reason: payload.reason,
        })
        .await?;
    Ok(success_response(invoice))
}

/// Create the payment plan of an approved invoice
#[utoipa::path(
    post,
    path = "/api/v1/invoices/{id}/payment-plan",
    params(("id" = Uuid, Path, description = "Invoice ID")),
    request_body = PlanSchedule,
    responses(
        (status = 201, description = "Payment plan created", body = crate::ApiResponse<PaymentPlan>),
        (status = 400, description = "Installments do not add up or precede the issue date", body = crate::errors::ErrorResponse),
        (status = 409, description = "Invoice already has a plan", body = crate::errors::ErrorResponse),
        (status = 422, description = "Invoice is not approved", body = crate::errors::ErrorResponse)
    ),
    tag = "invoices",
    security(("bearer_auth" = []))
)]
pub async fn create_payment_plan(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(invoice_id): Path<Uuid>,
    ApiJson(schedule): ApiJson<PlanSchedule>,
) -> Result<impl IntoResponse, ServiceError> {
    let plan = state
        .workflow
        .create_payment_plan(CreatePaymentPlanCommand {
            actor,
            invoice_id,
            schedule,
        })
        .await?;
    Ok(created_response(plan))
}
