use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::common::{get_typed, list_typed, success_response, ApiJson, ListQuery};
use crate::{
    auth::AuthenticatedActor,
    commands::payments::{RecordPaymentCommand, RecordPaymentResult},
    errors::ServiceError,
    models::{EntityKind, PaymentPlan},
    services::analytics::PaymentProgress,
    AppState,
};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RecordPaymentRequest {
    /// Must equal the installment amount
    #[schema(value_type = String, example = "2900.00")]
    pub amount: Decimal,
}

pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/payment-plans", get(list_payment_plans))
        .route("/payment-plans/:id", get(get_payment_plan))
        .route("/payment-plans/:id/progress", get(get_payment_progress))
        .route("/payments/:id/record", post(record_payment))
}

/// List payment plans
#[utoipa::path(
    get,
    path = "/api/v1/payment-plans",
    params(ListQuery),
    responses(
        (status = 200, description = "Payment plans visible to the caller", body = crate::ApiResponse<crate::PaginatedResponse<PaymentPlan>>)
    ),
    tag = "payments",
    security(("bearer_auth" = []))
)]
pub async fn list_payment_plans(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let page = list_typed::<PaymentPlan>(&state, &actor, EntityKind::PaymentPlan, &query).await?;
    Ok(success_response(page))
}

/// Get a payment plan by ID
#[utoipa::path(
    get,
    path = "/api/v1/payment-plans/{id}",
    params(("id" = Uuid, Path, description = "Payment plan ID")),
    responses(
        (status = 200, description = "Payment plan fetched", body = crate::ApiResponse<PaymentPlan>),
        (status = 404, description = "Payment plan not found", body = crate::errors::ErrorResponse)
    ),
    tag = "payments",
    security(("bearer_auth" = []))
)]
pub async fn get_payment_plan(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let plan = get_typed::<PaymentPlan>(&state, &actor, EntityKind::PaymentPlan, id).await?;
    Ok(success_response(plan))
}

/// Paid, remaining and percentage of a payment plan
#[utoipa::path(
    get,
    path = "/api/v1/payment-plans/{id}/progress",
    params(("id" = Uuid, Path, description = "Payment plan ID")),
    responses(
        (status = 200, description = "Progress computed", body = crate::ApiResponse<PaymentProgress>),
        (status = 404, description = "Payment plan not found", body = crate::errors::ErrorResponse)
    ),
    tag = "payments",
    security(("bearer_auth" = []))
)]
pub async fn get_payment_progress(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let progress = state.analytics.payment_progress(&actor, id).await?;
    Ok(success_response(progress))
}

/// Record the payment of one installment
#[utoipa::path(
    post,
    path = "/api/v1/payments/{id}/record",
    params(("id" = Uuid, Path, description = "Installment ID")),
    request_body = RecordPaymentRequest,
    responses(
        (status = 200, description = "Payment recorded", body = crate::ApiResponse<RecordPaymentResult>),
        (status = 400, description = "Amount does not match the installment", body = crate::errors::ErrorResponse),
        (status = 404, description = "Installment not found", body = crate::errors::ErrorResponse),
        (status = 422, description = "Installment already paid", body = crate::errors::ErrorResponse)
    ),
    tag = "payments",
    security(("bearer_auth" = []))
)]
pub async fn record_payment(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(payment_id): Path<Uuid>,
    ApiJson(payload): ApiJson<RecordPaymentRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let result = state
        .workflow
        .record_payment(RecordPaymentCommand {
            actor,
            payment_id,
            amount: payload.amount,
        })
        .await?;
    Ok(success_response(result))
}
