use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::{authorize, Actor, WorkflowCommand},
    commands::{validate_not_blank, validate_positive_amount, Command, WorkflowContext},
    errors::ServiceError,
    events::TransitionEvent,
    models::{DocumentRef, EntityKind, Invoice, PurchaseOrder, PurchaseOrderStatus, Supplier},
    store::{committed, ChangeSet, EntityStoreExt},
};

/// A supplier bills a delivered purchase order. Several invoices may be
/// submitted against the same order.
#[derive(Debug, Clone, Validate)]
pub struct SubmitInvoiceCommand {
    pub actor: Actor,
    pub purchase_order_id: Uuid,
    #[validate(
        length(min = 1, max = 64, message = "Invoice number must be between 1 and 64 characters"),
        custom = "validate_not_blank"
    )]
    pub invoice_number: String,
    #[validate(custom = "validate_positive_amount")]
    pub amount: Decimal,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub documents: Vec<DocumentRef>,
}

#[async_trait]
impl Command for SubmitInvoiceCommand {
    type Result = Invoice;

    #[instrument(skip(self, ctx), fields(purchase_order_id = %self.purchase_order_id, actor = %self.actor.id))]
    async fn execute(&self, ctx: &WorkflowContext) -> Result<Self::Result, ServiceError> {
        self.validate()?;
        if self.due_date < self.issue_date {
            return Err(ServiceError::ValidationError(format!(
                "due date {} precedes issue date {}",
                self.due_date, self.issue_date
            )));
        }
        if self.documents.iter().any(DocumentRef::is_blank) {
            return Err(ServiceError::ValidationError(
                "document references must not be blank".into(),
            ));
        }

        authorize(&self.actor, WorkflowCommand::SubmitInvoice, None)?;

        let _guard = ctx.locks.acquire(self.purchase_order_id).await;
        let order: PurchaseOrder = ctx.store.fetch(self.purchase_order_id).await?;
        let supplier: Supplier = ctx.store.fetch(order.supplier_id).await?;
        authorize(
            &self.actor,
            WorkflowCommand::SubmitInvoice,
            Some(supplier.owner_id),
        )?;

        if order.status != PurchaseOrderStatus::Delivered {
            warn!(purchase_order_id = %order.id, status = %order.status, "invoice for undelivered order");
            return Err(ServiceError::invalid_transition(
                EntityKind::PurchaseOrder,
                order.id,
                order.status,
                "invoice",
            ));
        }

        let invoice = Invoice::new(
            order.id,
            order.supplier_id,
            self.invoice_number.trim().to_string(),
            self.amount,
            order.currency.clone(),
            self.issue_date,
            self.due_date,
            self.documents.clone(),
            self.actor.id,
            ctx.now(),
        );
        let event = TransitionEvent::created(
            EntityKind::Invoice,
            invoice.id,
            invoice.status,
            Some(&self.actor),
            ctx.now(),
        );

        let id = invoice.id;
        let records = ctx.commit(ChangeSet::new().insert(invoice), vec![event]).await?;
        let invoice: Invoice = committed(&records, id)?;

        info!(
            invoice_id = %invoice.id,
            invoice_number = %invoice.invoice_number,
            amount = %invoice.amount,
            "Invoice submitted"
        );
        Ok(invoice)
    }
}
