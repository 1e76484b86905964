use async_trait::async_trait;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use super::{ensure_reviewable, lock_for_review};
use crate::{
    auth::{authorize, Actor, WorkflowCommand},
    commands::{Command, WorkflowContext},
    errors::ServiceError,
    events::TransitionEvent,
    models::{EntityKind, Quotation},
    store::{committed, ChangeSet},
};

#[derive(Debug, Clone, Validate)]
pub struct RejectQuotationCommand {
    pub actor: Actor,
    pub quotation_id: Uuid,
    #[validate(length(max = 1000, message = "Reason cannot exceed 1000 characters"))]
    pub reason: Option<String>,
}

#[async_trait]
impl Command for RejectQuotationCommand {
    type Result = Quotation;

    #[instrument(skip(self, ctx), fields(quotation_id = %self.quotation_id, actor = %self.actor.id))]
    async fn execute(&self, ctx: &WorkflowContext) -> Result<Self::Result, ServiceError> {
        self.validate()?;
        authorize(&self.actor, WorkflowCommand::RejectQuotation, None)?;

        let (_guard, mut quotation, rfq) = lock_for_review(ctx, self.quotation_id).await?;
        let from = quotation.status;
        let reason = self
            .reason
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string);
        quotation.reject(self.actor.id, reason, ctx.now())?;
        ensure_reviewable(&rfq, "review quotations of")?;

        let event = TransitionEvent::changed(
            EntityKind::Quotation,
            quotation.id,
            from,
            quotation.status,
            Some(&self.actor),
            ctx.now(),
        )
        .within(rfq.id);
        let records = ctx
            .commit(ChangeSet::new().update(quotation), vec![event])
            .await?;

        info!(quotation_id = %self.quotation_id, rfq_id = %rfq.id, "Quotation rejected");
        committed(&records, self.quotation_id)
    }
}
