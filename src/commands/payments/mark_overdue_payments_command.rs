use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    commands::{Command, WorkflowContext},
    errors::ServiceError,
    events::TransitionEvent,
    models::{EntityKind, PaymentPlan, PaymentPlanStatus, PaymentStatus},
    store::{ChangeSet, EntityFilter, EntityStoreExt},
};

/// System sweep: flags scheduled installments whose due date is before `today`.
/// Returns the installment ids that became overdue.
#[derive(Debug, Clone)]
pub struct MarkOverduePaymentsCommand {
    pub today: NaiveDate,
}

#[async_trait]
impl Command for MarkOverduePaymentsCommand {
    type Result = Vec<Uuid>;

    #[instrument(skip(self, ctx), fields(today = %self.today))]
    async fn execute(&self, ctx: &WorkflowContext) -> Result<Self::Result, ServiceError> {
        let plans: Vec<PaymentPlan> = ctx
            .store
            .find(&EntityFilter::new(EntityKind::PaymentPlan).status(PaymentPlanStatus::Active))
            .await?;

        let mut flagged = Vec::new();
        for plan in plans.iter().filter(|plan| self.has_late_installments(plan)) {
            match self.mark_plan(ctx, plan.id, plan.invoice_id).await {
                Ok(ids) => flagged.extend(ids),
                Err(e) => warn!(payment_plan_id = %plan.id, error = %e, "could not mark overdue installments"),
            }
        }

        if !flagged.is_empty() {
            info!(count = flagged.len(), "Installments marked overdue");
        }
        Ok(flagged)
    }
}

impl MarkOverduePaymentsCommand {
    fn has_late_installments(&self, plan: &PaymentPlan) -> bool {
        plan.installments
            .iter()
            .any(|p| p.status == PaymentStatus::Scheduled && self.today > p.due_date)
    }

    async fn mark_plan(
        &self,
        ctx: &WorkflowContext,
        plan_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Vec<Uuid>, ServiceError> {
        let _guard = ctx.locks.acquire(invoice_id).await;
        let mut plan: PaymentPlan = ctx.store.fetch(plan_id).await?;
        let now = ctx.now();
        let changed = plan.mark_overdue(self.today, now);
        if changed.is_empty() {
            return Ok(changed);
        }

        let events = changed
            .iter()
            .map(|id| {
                TransitionEvent::changed(
                    EntityKind::Payment,
                    *id,
                    PaymentStatus::Scheduled,
                    PaymentStatus::Overdue,
                    None,
                    now,
                )
                .within(plan_id)
            })
            .collect();
        ctx.commit(ChangeSet::new().update(plan), events).await?;
        Ok(changed)
    }
}
