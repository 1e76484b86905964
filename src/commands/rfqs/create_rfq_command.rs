use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::{
    auth::{authorize, Actor, WorkflowCommand},
    commands::{validate_not_blank, Command, WorkflowContext},
    errors::ServiceError,
    events::TransitionEvent,
    models::{EntityKind, Rfq, Supplier},
    store::{committed, ChangeSet, EntityStoreExt},
};

fn validate_requirements(requirements: &[String]) -> Result<(), ValidationError> {
    if requirements.iter().any(|r| r.trim().is_empty()) {
        let mut err = ValidationError::new("requirements");
        err.message = Some("requirements must not contain blank entries".into());
        return Err(err);
    }
    Ok(())
}

#[derive(Debug, Clone, Validate)]
pub struct CreateRfqCommand {
    pub actor: Actor,
    #[validate(
        length(min = 1, max = 200, message = "Title must be between 1 and 200 characters"),
        custom = "validate_not_blank"
    )]
    pub title: String,
    #[validate(length(max = 5000, message = "Description cannot exceed 5000 characters"))]
    pub description: String,
    #[validate(
        length(min = 1, message = "At least one requirement is needed"),
        custom = "validate_requirements"
    )]
    pub requirements: Vec<String>,
    pub deadline: NaiveDate,
    #[validate(length(min = 1, message = "At least one supplier must be invited"))]
    pub invited_supplier_ids: Vec<Uuid>,
}

#[async_trait]
impl Command for CreateRfqCommand {
    type Result = Rfq;

    #[instrument(skip(self, ctx), fields(actor = %self.actor.id, title = %self.title))]
    async fn execute(&self, ctx: &WorkflowContext) -> Result<Self::Result, ServiceError> {
        self.validate()?;
        let today = ctx.today();
        if self.deadline < today {
            return Err(ServiceError::ValidationError(format!(
                "deadline {} is in the past",
                self.deadline
            )));
        }

        authorize(&self.actor, WorkflowCommand::CreateRfq, None)?;

        for supplier_id in &self.invited_supplier_ids {
            let supplier: Supplier = match ctx.store.fetch(*supplier_id).await {
                Ok(supplier) => supplier,
                Err(ServiceError::NotFound(_)) => {
                    warn!(%supplier_id, "RFQ invites unknown supplier");
                    return Err(ServiceError::ValidationError(format!(
                        "invited supplier {} does not exist",
                        supplier_id
                    )));
                }
                Err(e) => return Err(e),
            };
            if !supplier.is_approved() {
                return Err(ServiceError::ValidationError(format!(
                    "invited supplier {} is {}, only approved suppliers can be invited",
                    supplier_id, supplier.status
                )));
            }
        }

        let requirements = self
            .requirements
            .iter()
            .map(|r| r.trim().to_string())
            .collect();
        let rfq = Rfq::new(
            self.title.trim().to_string(),
            self.description.trim().to_string(),
            requirements,
            self.deadline,
            self.actor.id,
            self.invited_supplier_ids.clone(),
            ctx.now(),
        );
        let event =
            TransitionEvent::created(EntityKind::Rfq, rfq.id, rfq.status, Some(&self.actor), ctx.now());

        let id = rfq.id;
        let records = ctx.commit(ChangeSet::new().insert(rfq), vec![event]).await?;
        let rfq: Rfq = committed(&records, id)?;

        info!(
            rfq_id = %rfq.id,
            deadline = %rfq.deadline,
            invited = rfq.invited_supplier_ids.len(),
            "RFQ created"
        );
        Ok(rfq)
    }
}
