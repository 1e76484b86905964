use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{ensure_reviewable, lock_for_review};
use crate::{
    auth::{authorize, Actor, WorkflowCommand},
    commands::{Command, WorkflowContext},
    errors::ServiceError,
    events::TransitionEvent,
    models::{EntityKind, Quotation, QuotationStatus, Rfq},
    store::{committed, ChangeSet, EntityFilter, EntityStoreExt},
};

pub const AUTO_REJECTION_REASON: &str = "another quotation was awarded";

/// Awards an RFQ: the quotation is approved, every other submitted quotation of
/// the same RFQ is rejected and the RFQ becomes awarded, in one commit.
#[derive(Debug, Clone)]
pub struct ApproveQuotationCommand {
    pub actor: Actor,
    pub quotation_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApproveQuotationResult {
    pub quotation: Quotation,
    pub rfq: Rfq,
    pub rejected_quotation_ids: Vec<Uuid>,
}

#[async_trait]
impl Command for ApproveQuotationCommand {
    type Result = ApproveQuotationResult;

    #[instrument(skip(self, ctx), fields(quotation_id = %self.quotation_id, actor = %self.actor.id))]
    async fn execute(&self, ctx: &WorkflowContext) -> Result<Self::Result, ServiceError> {
        authorize(&self.actor, WorkflowCommand::ApproveQuotation, None)?;

        let (_guard, mut quotation, mut rfq) = lock_for_review(ctx, self.quotation_id).await?;
        let now = ctx.now();

        let from = quotation.status;
        quotation.approve(self.actor.id, now)?;
        ensure_reviewable(&rfq, "award")?;

        let mut events = vec![TransitionEvent::changed(
            EntityKind::Quotation,
            quotation.id,
            from,
            quotation.status,
            Some(&self.actor),
            now,
        )
        .within(rfq.id)];
        let mut changes = ChangeSet::new();

        let siblings: Vec<Quotation> = ctx
            .store
            .find(
                &EntityFilter::new(EntityKind::Quotation)
                    .rfq(rfq.id)
                    .status(QuotationStatus::Submitted),
            )
            .await?;
        let mut rejected_quotation_ids = Vec::new();
        for mut sibling in siblings.into_iter().filter(|q| q.id != quotation.id) {
            sibling.reject(self.actor.id, Some(AUTO_REJECTION_REASON.to_string()), now)?;
            events.push(
                TransitionEvent::changed(
                    EntityKind::Quotation,
                    sibling.id,
                    QuotationStatus::Submitted,
                    sibling.status,
                    Some(&self.actor),
                    now,
                )
                .within(rfq.id),
            );
            rejected_quotation_ids.push(sibling.id);
            changes.push_update(sibling);
        }

        let rfq_from = rfq.status;
        rfq.award(quotation.id, now)?;
        events.push(TransitionEvent::changed(
            EntityKind::Rfq,
            rfq.id,
            rfq_from,
            rfq.status,
            Some(&self.actor),
            now,
        ));

        let rfq_id = rfq.id;
        changes.push_update(quotation);
        changes.push_update(rfq);
        let records = ctx.commit(changes, events).await?;

        info!(
            quotation_id = %self.quotation_id,
            %rfq_id,
            rejected = rejected_quotation_ids.len(),
            "Quotation approved and RFQ awarded"
        );
        Ok(ApproveQuotationResult {
            quotation: committed(&records, self.quotation_id)?,
            rfq: committed(&records, rfq_id)?,
            rejected_quotation_ids,
        })
    }
}
