use async_trait::async_trait;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::{authorize, Actor, WorkflowCommand},
    commands::{validate_not_blank, Command, WorkflowContext},
    errors::ServiceError,
    events::TransitionEvent,
    models::{EntityKind, Invoice},
    store::{committed, ChangeSet, EntityStoreExt},
};

#[derive(Debug, Clone, Validate)]
pub struct RejectInvoiceCommand {
    pub actor: Actor,
    pub invoice_id: Uuid,
    #[validate(
        length(max = 1000, message = "Reason cannot exceed 1000 characters"),
        custom = "validate_not_blank"
    )]
    pub reason: String,
}

#[async_trait]
impl Command for RejectInvoiceCommand {
    type Result = Invoice;

    #[instrument(skip(self, ctx), fields(invoice_id = %self.invoice_id, actor = %self.actor.id))]
    async fn execute(&self, ctx: &WorkflowContext) -> Result<Self::Result, ServiceError> {
        self.validate()?;
        authorize(&self.actor, WorkflowCommand::RejectInvoice, None)?;

        let _guard = ctx.locks.acquire(self.invoice_id).await;
        let mut invoice: Invoice = ctx.store.fetch(self.invoice_id).await?;
        let from = invoice.status;
        invoice.reject(self.actor.id, self.reason.trim().to_string(), ctx.now())?;

        let event = TransitionEvent::changed(
            EntityKind::Invoice,
            invoice.id,
            from,
            invoice.status,
            Some(&self.actor),
            ctx.now(),
        );
        let records = ctx.commit(ChangeSet::new().update(invoice), vec![event]).await?;

        info!(invoice_id = %self.invoice_id, reason = %self.reason, "Invoice rejected");
        committed(&records, self.invoice_id)
    }
}
