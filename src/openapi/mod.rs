use utoipa::{
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
    Modify, OpenApi,
};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Procurement API",
        version = "1.0.0",
        description = r#"
# Procurement Workflow API

Supplier onboarding, requests for quotation, quotation review, purchase orders,
invoices and installment payment plans.

## Authentication

Every `/api/v1` endpoint requires a bearer JWT whose claims carry the actor id
and role (`admin`, `purchaser`, `finance` or `provider`):

```
Authorization: Bearer <your-jwt-token>
```

## Error Handling

Errors share one body:

```json
{
  "error": "Unprocessable Entity",
  "code": "invalid_transition",
  "message": "Invalid transition: cannot approve quotation ... while it is rejected",
  "request_id": "req-abc123",
  "timestamp": "2026-01-01T00:00:00Z"
}
```

`401` missing or invalid token, `403` role or ownership denial, `400` invalid
input, `404` unknown entity, `409` duplicate, `422` illegal state transition.

## Pagination

List endpoints take `page` (default 1) and `per_page` (default 20, max 100).
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "suppliers", description = "Supplier registration and review"),
        (name = "rfqs", description = "Requests for quotation"),
        (name = "quotations", description = "Quotation review and award"),
        (name = "purchase-orders", description = "Purchase order lifecycle"),
        (name = "invoices", description = "Invoice review and payment plans"),
        (name = "payments", description = "Installments and progress"),
        (name = "entities", description = "Generic entity reads"),
        (name = "reports", description = "Dashboard and reports"),
        (name = "notifications", description = "Per-actor notification inbox"),
        (name = "health", description = "Health check endpoints")
    ),
    paths(
        crate::handlers::suppliers::register_supplier,
        crate::handlers::suppliers::list_suppliers,
        crate::handlers::suppliers::get_supplier,
        crate::handlers::suppliers::approve_supplier,
        crate::handlers::suppliers::reject_supplier,
        crate::handlers::suppliers::update_supplier_contact,

        crate::handlers::rfqs::create_rfq,
        crate::handlers::rfqs::list_rfqs,
        crate::handlers::rfqs::get_rfq,
        crate::handlers::rfqs::close_rfq,
        crate::handlers::rfqs::submit_quotation,

        crate::handlers::quotations::list_quotations,
        crate::handlers::quotations::get_quotation,
        crate::handlers::quotations::approve_quotation,
        crate::handlers::quotations::reject_quotation,
        crate::handlers::quotations::generate_purchase_order,

        crate::handlers::purchase_orders::list_purchase_orders,
        crate::handlers::purchase_orders::get_purchase_order,
        crate::handlers::purchase_orders::send_purchase_order,
        crate::handlers::purchase_orders::confirm_purchase_order,
        crate::handlers::purchase_orders::mark_delivered,
        crate::handlers::purchase_orders::cancel_purchase_order,
        crate::handlers::purchase_orders::submit_invoice,

        crate::handlers::invoices::list_invoices,
        crate::handlers::invoices::get_invoice,
        crate::handlers::invoices::approve_invoice,
        crate::handlers::invoices::reject_invoice,
        crate::handlers::invoices::create_payment_plan,

        crate::handlers::payments::list_payment_plans,
        crate::handlers::payments::get_payment_plan,
        crate::handlers::payments::get_payment_progress,
        crate::handlers::payments::record_payment,

        crate::handlers::entities::list_entities,
        crate::handlers::entities::get_entity,

        crate::handlers::reports::get_dashboard,
        crate::handlers::reports::get_report,

        crate::handlers::notifications::list_notifications,
        crate::handlers::notifications::mark_notification_read,

        crate::handlers::health::liveness,
        crate::handlers::health::status,
    ),
    components(
        schemas(
            // Entities
            crate::models::Supplier,
            crate::models::SupplierStatus,
            crate::models::ContactInfo,
            crate::models::DocumentRef,
            crate::models::SupplierDocuments,
            crate::models::Rfq,
            crate::models::RfqStatus,
            crate::models::Quotation,
            crate::models::QuotationStatus,
            crate::models::PurchaseOrder,
            crate::models::PurchaseOrderStatus,
            crate::models::LineItem,
            crate::models::Invoice,
            crate::models::InvoiceStatus,
            crate::models::PaymentPlan,
            crate::models::PaymentPlanStatus,
            crate::models::Payment,
            crate::models::PaymentStatus,
            crate::models::EntityKind,
            crate::store::Record,

            // Requests
            crate::handlers::suppliers::RegisterSupplierRequest,
            crate::handlers::suppliers::RejectSupplierRequest,
            crate::handlers::rfqs::CreateRfqRequest,
            crate::handlers::rfqs::SubmitQuotationRequest,
            crate::handlers::quotations::RejectQuotationRequest,
            crate::handlers::quotations::GeneratePurchaseOrderRequest,
            crate::handlers::purchase_orders::CancelPurchaseOrderRequest,
            crate::handlers::purchase_orders::SubmitInvoiceRequest,
            crate::handlers::invoices::RejectInvoiceRequest,
            crate::handlers::payments::RecordPaymentRequest,
            crate::commands::purchaseorders::LineItemInput,
            crate::commands::payments::PlanSchedule,
            crate::commands::payments::InstallmentInput,

            // Results
            crate::commands::quotations::ApproveQuotationResult,
            crate::commands::payments::RecordPaymentResult,
            crate::services::analytics::DashboardStats,
            crate::services::analytics::PaymentProgress,
            crate::services::analytics::Report,
            crate::services::analytics::ReportRow,
            crate::services::analytics::ReportKind,
            crate::services::analytics::DateRange,
            crate::notifications::Notification,
            crate::notifications::NotificationType,
            crate::notifications::Recipient,
            crate::auth::Role,
            crate::handlers::health::StatusResponse,
            crate::handlers::health::ComponentHealth,
            crate::handlers::health::ComponentStatus,

            // Error types
            crate::errors::ErrorResponse
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDocV1;

/// Registers the `bearer_auth` scheme the handler annotations refer to.
pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}

/// The document as pretty JSON, as served at `/api-docs/openapi.json`.
pub fn openapi_json() -> Result<String, serde_json::Error> {
    ApiDocV1::openapi().to_pretty_json()
}
