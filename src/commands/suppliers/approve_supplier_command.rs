use async_trait::async_trait;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::{authorize, Actor, WorkflowCommand},
    commands::{Command, WorkflowContext},
    errors::ServiceError,
    events::TransitionEvent,
    models::{EntityKind, Supplier},
    store::{committed, ChangeSet, EntityStoreExt},
};

#[derive(Debug, Clone)]
pub struct ApproveSupplierCommand {
    pub actor: Actor,
    pub supplier_id: Uuid,
}

#[async_trait]
impl Command for ApproveSupplierCommand {
    type Result = Supplier;

    #[instrument(skip(self, ctx), fields(supplier_id = %self.supplier_id, actor = %self.actor.id))]
    async fn execute(&self, ctx: &WorkflowContext) -> Result<Self::Result, ServiceError> {
        authorize(&self.actor, WorkflowCommand::ApproveSupplier, None)?;

        let _guard = ctx.locks.acquire(self.supplier_id).await;
        let mut supplier: Supplier = ctx.store.fetch(self.supplier_id).await?;
        let from = supplier.status;
        supplier.approve(self.actor.id, ctx.now())?;

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

        info!(supplier_id = %self.supplier_id, "Supplier approved");
        committed(&records, self.supplier_id)
    }
}
