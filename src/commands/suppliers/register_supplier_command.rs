use async_trait::async_trait;
use tracing::{info, instrument};
use validator::Validate;

use crate::{
    auth::{authorize, Actor, WorkflowCommand},
    commands::{validate_not_blank, Command, WorkflowContext},
    errors::ServiceError,
    events::TransitionEvent,
    models::{ContactInfo, EntityKind, Supplier, SupplierDocuments},
    store::{committed, ChangeSet},
};

#[derive(Debug, Clone, Validate)]
pub struct RegisterSupplierCommand {
    pub actor: Actor,
    #[validate(
        length(min = 10, max = 16, message = "Tax ID must be between 10 and 16 characters"),
        custom = "validate_not_blank"
    )]
    pub tax_id: String,
    #[validate(
        length(min = 1, max = 200, message = "Business name must be between 1 and 200 characters"),
        custom = "validate_not_blank"
    )]
    pub business_name: String,
    #[validate(length(min = 1, max = 500, message = "Address must be between 1 and 500 characters"))]
    pub address: String,
    #[validate]
    pub contact: ContactInfo,
    pub documents: SupplierDocuments,
}

#[async_trait]
impl Command for RegisterSupplierCommand {
    type Result = Supplier;

    #[instrument(skip(self, ctx), fields(actor = %self.actor.id))]
    async fn execute(&self, ctx: &WorkflowContext) -> Result<Self::Result, ServiceError> {
        self.validate()?;
        let missing = self.documents.missing();
        if !missing.is_empty() {
            return Err(ServiceError::ValidationError(format!(
                "missing required documents: {}",
                missing.join(", ")
            )));
        }

        authorize(&self.actor, WorkflowCommand::RegisterSupplier, None)?;

        let supplier = Supplier::new(
            &self.tax_id,
            self.business_name.trim().to_string(),
            self.address.trim().to_string(),
            self.contact.clone(),
            self.documents.clone(),
            self.actor.id,
            ctx.now(),
        );
        let event = TransitionEvent::created(
            EntityKind::Supplier,
            supplier.id,
            supplier.status,
            Some(&self.actor),
            ctx.now(),
        );

        let id = supplier.id;
        let records = ctx
            .commit(ChangeSet::new().insert(supplier), vec![event])
            .await?;
        let supplier: Supplier = committed(&records, id)?;

        info!(supplier_id = %supplier.id, tax_id = %supplier.tax_id, "Supplier registered");
        Ok(supplier)
    }
}
