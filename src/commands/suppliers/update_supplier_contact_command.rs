use async_trait::async_trait;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::{authorize, Actor, WorkflowCommand},
    commands::{Command, WorkflowContext},
    errors::ServiceError,
    models::{ContactInfo, Supplier},
    store::{committed, ChangeSet, EntityStoreExt},
};

/// Replaces the contact block of a supplier. Status does not change, so no
/// transition event is emitted.
#[derive(Debug, Clone, Validate)]
pub struct UpdateSupplierContactCommand {
    pub actor: Actor,
    pub supplier_id: Uuid,
    #[validate]
    pub contact: ContactInfo,
}

#[async_trait]
impl Command for UpdateSupplierContactCommand {
    type Result = Supplier;

    #[instrument(skip(self, ctx), fields(supplier_id = %self.supplier_id, actor = %self.actor.id))]
    async fn execute(&self, ctx: &WorkflowContext) -> Result<Self::Result, ServiceError> {
        self.validate()?;
        authorize(&self.actor, WorkflowCommand::UpdateSupplierContact, None)?;

        let _guard = ctx.locks.acquire(self.supplier_id).await;
        let mut supplier: Supplier = ctx.store.fetch(self.supplier_id).await?;
        authorize(
            &self.actor,
            WorkflowCommand::UpdateSupplierContact,
            Some(supplier.owner_id),
        )?;
        supplier.update_contact(self.contact.clone(), ctx.now())?;

        let records = ctx
            .commit(ChangeSet::new().update(supplier), Vec::new())
            .await?;

        info!(supplier_id = %self.supplier_id, "Supplier contact updated");
        committed(&records, self.supplier_id)
    }
}
