use async_trait::async_trait;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::{authorize, Actor, WorkflowCommand},
    commands::{Command, WorkflowContext},
    errors::ServiceError,
    events::TransitionEvent,
    models::{EntityKind, Invoice},
    store::{committed, ChangeSet, EntityStoreExt},
};

#[derive(Debug, Clone)]
pub struct ApproveInvoiceCommand {
    pub actor: Actor,
    pub invoice_id: Uuid,
}

#[async_trait]
impl Command for ApproveInvoiceCommand {
    type Result = Invoice;

    #[instrument(skip(self, ctx), fields(invoice_id = %self.invoice_id, actor = %self.actor.id))]
    async fn execute(&self, ctx: &WorkflowContext) -> Result<Self::Result, ServiceError> {
        authorize(&self.actor, WorkflowCommand::ApproveInvoice, None)?;

        let _guard = ctx.locks.acquire(self.invoice_id).await;
        let mut invoice: Invoice = ctx.store.fetch(self.invoice_id).await?;
        let from = invoice.status;
        invoice.approve(self.actor.id, ctx.now())?;

        let event = TransitionEvent::changed(
            EntityKind::Invoice,
            invoice.id,
            from,
            invoice.status,
            Some(&self.actor),
            ctx.now(),
        );
        let records = ctx.commit(ChangeSet::new().update(invoice), vec![event]).await?;

        info!(invoice_id = %self.invoice_id, "Invoice approved");
        committed(&records, self.invoice_id)
    }
}
