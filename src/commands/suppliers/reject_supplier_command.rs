use async_trait::async_trait;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::{authorize, Actor, WorkflowCommand},
    commands::{validate_not_blank, Command, WorkflowContext},
    errors::ServiceError,
    events::TransitionEvent,
    models::{EntityKind, Supplier},
    store::{committed, ChangeSet, EntityStoreExt},
};

#[derive(Debug, Clone, Validate)]
pub struct RejectSupplierCommand {
    pub actor: Actor,
    pub supplier_id: Uuid,
    #[validate(
        length(max = 1000, message = "Reason cannot exceed 1000 characters"),
        custom = "validate_not_blank"
    )]
    pub reason: String,
}

#[async_trait]
impl Command for RejectSupplierCommand {
    type Result = Supplier;

    #[instrument(skip(self, ctx), fields(supplier_id = %self.supplier_id, actor = %self.actor.id))]
    async fn execute(&self, ctx: &WorkflowContext) -> Result<Self::Result, ServiceError> {
        self.validate()?;
        authorize(&self.actor, WorkflowCommand::RejectSupplier, None)?;

        let _guard = ctx.locks.acquire(self.supplier_id).await;
        let mut supplier: Supplier = ctx.store.fetch(self.supplier_id).await?;
        let from = supplier.status;
        supplier.reject(self.actor.id, self.reason.trim().to_string(), ctx.now())?;

        let event = TransitionEvent::changed(
            EntityKind::Supplier,
            supplier.id,
            from,
            supplier.status,
            Some(&self.actor),
            ctx.now(),
        );
        let records = ctx
            .commit(ChangeSet::new().update(supplier), vec![event])
            .await?;

        info!(supplier_id = %self.supplier_id, reason = %self.reason, "Supplier rejected");
        committed(&records, self.supplier_id)
    }
}
