use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use super::common::{
    created_response, get_typed, list_typed, success_response, ApiJson, ListQuery,
};
use crate::{
    auth::AuthenticatedActor,
    commands::suppliers::{
        ApproveSupplierCommand, RegisterSupplierCommand, RejectSupplierCommand,
        UpdateSupplierContactCommand,
    },
    errors::ServiceError,
    models::{ContactInfo, EntityKind, Supplier, SupplierDocuments},
    AppState,
};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RegisterSupplierRequest {
    #[schema(example = "PNO010203AB1")]
    pub tax_id: String,
    pub business_name: String,
    pub address: String,
    pub contact: ContactInfo,
    pub documents: SupplierDocuments,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RejectSupplierRequest {
    pub reason: String,
}

pub fn supplier_routes() -> Router<AppState> {
    Router::new()
        .route("/suppliers", post(register_supplier).get(list_suppliers))
        .route("/suppliers/:id", get(get_supplier))
        .route("/suppliers/:id/approve", post(approve_supplier))
        .route("/suppliers/:id/reject", post(reject_supplier))
        .route("/suppliers/:id/contact", put(update_supplier_contact))
}

/// Register a supplier
#[utoipa::path(
    post,
    path = "/api/v1/suppliers",
    request_body = RegisterSupplierRequest,
    responses(
        (status = 201, description = "Supplier registered, pending review", body = crate::ApiResponse<Supplier>),
        (status = 400, description = "Invalid request or missing documents", body = crate::errors::ErrorResponse),
        (status = 403, description = "Role may not register suppliers", body = crate::errors::ErrorResponse),
        (status = 409, description = "Tax ID already registered", body = crate::errors::ErrorResponse)
    ),
    tag = "suppliers",
    security(("bearer_auth" = []))
)]
pub async fn register_supplier(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    ApiJson(payload): ApiJson<RegisterSupplierRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let supplier = state
        .workflow
        .register_supplier(RegisterSupplierCommand {
            actor,
            tax_id: payload.tax_id,
            business_name: payload.business_name,
            address: payload.address,
            contact: payload.contact,
            documents: payload.documents,
        })
        .await?;

    info!(supplier_id = %supplier.id, "Supplier registration accepted");
    Ok(created_response(supplier))
}

/// List suppliers
#[utoipa::path(
    get,
    path = "/api/v1/suppliers",
    params(ListQuery),
    responses(
        (status = 200, description = "Suppliers visible to the caller", body = crate::ApiResponse<crate::PaginatedResponse<Supplier>>),
        (status = 400, description = "Invalid filter", body = crate::errors::ErrorResponse)
    ),
    tag = "suppliers",
    security(("bearer_auth" = []))
)]
pub async fn list_suppliers(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let page = list_typed::<Supplier>(&state, &actor, EntityKind::Supplier, &query).await?;
    Ok(success_response(page))
}

/// Get a supplier by ID
#[utoipa::path(
    get,
    path = "/api/v1/suppliers/{id}",
    params(("id" = Uuid, Path, description = "Supplier ID")),
    responses(
        (status = 200, description = "Supplier fetched", body = crate::ApiResponse<Supplier>),
        (status = 404, description = "Supplier not found", body = crate::errors::ErrorResponse)
    ),
    tag = "suppliers",
    security(("bearer_auth" = []))
)]
pub async fn get_supplier(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let supplier = get_typed::<Supplier>(&state, &actor, EntityKind::Supplier, id).await?;
    Ok(success_response(supplier))
}

/// Approve a pending supplier
#[utoipa::path(
    post,
    path = "/api/v1/suppliers/{id}/approve",
    params(("id" = Uuid, Path, description = "Supplier ID")),
    responses(
        (status = 200, description = "Supplier approved", body = crate::ApiResponse<Supplier>),
        (status = 403, description = "Role may not review suppliers", body = crate::errors::ErrorResponse),
        (status = 404, description = "Supplier not found", body = crate::errors::ErrorResponse),
        (status = 422, description = "Supplier is not pending", body = crate::errors::ErrorResponse)
    ),
    tag = "suppliers",
    security(("bearer_auth" = []))
)]
pub async fn approve_supplier(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(supplier_id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let supplier = state
        .workflow
        .approve_supplier(ApproveSupplierCommand { actor, supplier_id })
        .await?;
    Ok(success_response(supplier))
}

/// Reject a pending supplier
#[utoipa::path(
    post,
    path = "/api/v1/suppliers/{id}/reject",
    params(("id" = Uuid, Path, description = "Supplier ID")),
    request_body = RejectSupplierRequest,
    responses(
        (status = 200, description = "Supplier rejected", body = crate::ApiResponse<Supplier>),
        (status = 400, description = "Reason missing", body = crate::errors::ErrorResponse),
        (status = 403, description = "Role may not review suppliers", body = crate::errors::ErrorResponse),
        (status = 422, description = "Supplier is not pending", body = crate::errors::ErrorResponse)
    ),
    tag = "suppliers",
    security(("bearer_auth" = []))
)]
pub async fn reject_supplier(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(supplier_id): Path<Uuid>,
    ApiJson(payload): ApiJson<RejectSupplierRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let supplier = state
        .workflow
        .reject_supplier(RejectSupplierCommand {
            actor,
            supplier_id,
            reason: payload.reason,
        })
        .await?;
    Ok(success_response(supplier))
}

/// Replace a supplier's contact details
#[utoipa::path(
    put,
    path = "/api/v1/suppliers/{id}/contact",
    params(("id" = Uuid, Path, description = "Supplier ID")),
    request_body = ContactInfo,
    responses(
        (status = 200, description = "Contact updated", body = crate::ApiResponse<Supplier>),
        (status = 400, description = "Invalid contact", body = crate::errors::ErrorResponse),
        (status = 403, description = "Not the supplier's owner", body = crate::errors::ErrorResponse),
        (status = 422, description = "Supplier was rejected", body = crate::errors::ErrorResponse)
    ),
    tag = "suppliers",
    security(("bearer_auth" = []))
)]
pub async fn update_supplier_contact(
    State(state): State<AppState>,
    AuthenticatedActor(actor): AuthenticatedActor,
    Path(supplier_id): Path<Uuid>,
    ApiJson(contact): ApiJson<ContactInfo>,
) -> Result<impl IntoResponse, ServiceError> {
    let supplier = state
        .workflow
        .update_supplier_contact(UpdateSupplierContactCommand {
            actor,
            supplier_id,
            contact,
        })
        .await?;
    Ok(success_response(supplier))
}
