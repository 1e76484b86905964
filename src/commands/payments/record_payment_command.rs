use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::{authorize, Actor, WorkflowCommand},
    commands::{validate_positive_amount, Command, WorkflowContext},
    errors::ServiceError,
    events::TransitionEvent,
    models::{EntityKind, Invoice, PaymentPlan, PaymentPlanStatus, PaymentStatus},
    store::{committed, ChangeSet, EntityStoreExt, UniqueKey},
};

/// Settles one installment for its exact amount.
#[derive(Debug, Clone, Validate)]
pub struct RecordPaymentCommand {
    pub actor: Actor,
    pub payment_id: Uuid,
    #[validate(custom = "validate_positive_amount")]
    pub amount: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RecordPaymentResult {
    pub payment_plan: PaymentPlan,
    pub invoice: Invoice,
}

#[async_trait]
impl Command for RecordPaymentCommand {
    type Result = RecordPaymentResult;

    #[instrument(skip(self, ctx), fields(payment_id = %self.payment_id, actor = %self.actor.id))]
    async fn execute(&self, ctx: &WorkflowContext) -> Result<Self::Result, ServiceError> {
        self.validate()?;
        authorize(&self.actor, WorkflowCommand::RecordPayment, None)?;

        let plan_id = ctx
            .store
            .lookup(&UniqueKey::PaymentInstallment(self.payment_id))
            .await?
            .ok_or_else(|| ServiceError::not_found(EntityKind::Payment, self.payment_id))?;
        let unlocked: PaymentPlan = ctx.store.fetch(plan_id).await?;

        let _guard = ctx.locks.acquire(unlocked.invoice_id).await;
        let mut plan: PaymentPlan = ctx.store.fetch(plan_id).await?;
        let mut invoice: Invoice = ctx.store.fetch(plan.invoice_id).await?;
        let now = ctx.now();

        let previous = plan.record_payment(self.payment_id, self.amount, self.actor.id, now)?;
        let invoice_from = invoice.status;
        invoice.apply_payment(self.amount, now)?;

        let mut events = vec![TransitionEvent::changed(
            EntityKind::Payment,
            self.payment_id,
            previous,
            PaymentStatus::Paid,
            Some(&self.actor),
            now,
        )
        .within(plan.id)];
        if plan.status == PaymentPlanStatus::Completed {
            events.push(TransitionEvent::changed(
                EntityKind::PaymentPlan,
                plan.id,
                PaymentPlanStatus::Active,
                plan.status,
                Some(&self.actor),
                now,
            ));
        }
        if invoice.status != invoice_from {
            events.push(TransitionEvent::changed(
                EntityKind::Invoice,
                invoice.id,
                invoice_from,
                invoice.status,
                Some(&self.actor),
                now,
            ));
        }

        let invoice_id = invoice.id;
        let records = ctx
            .commit(ChangeSet::new().update(plan).update(invoice), events)
            .await?;
        let result = RecordPaymentResult {
            payment_plan: committed(&records, plan_id)?,
            invoice: committed(&records, invoice_id)?,
        };

        info!(
            payment_plan_id = %plan_id,
            %invoice_id,
            amount = %self.amount,
            remaining = %result.invoice.remaining(),
            "Payment recorded"
        );
        Ok(result)
    }
}
