use uuid::Uuid;

use crate::{
    commands::WorkflowContext,
    errors::ServiceError,
    models::{Quotation, Rfq, RfqStatus},
    store::{EntityStoreExt, LockGuard},
};

pub mod approve_quotation_command;
pub mod reject_quotation_command;
pub mod submit_quotation_command;

pub use approve_quotation_command::{ApproveQuotationCommand, ApproveQuotationResult};
pub use reject_quotation_command::RejectQuotationCommand;
pub use submit_quotation_command::SubmitQuotationCommand;

/// Takes the lock of the quotation's RFQ and re-reads both under it.
pub(crate) async fn lock_for_review(
    ctx: &WorkflowContext,
    quotation_id: Uuid,
) -> Result<(LockGuard, Quotation, Rfq), ServiceError> {
    let unlocked: Quotation = ctx.store.fetch(quotation_id).await?;
    let guard = ctx.locks.acquire(unlocked.rfq_id).await;
    let quotation: Quotation = ctx.store.fetch(quotation_id).await?;
    let rfq: Rfq = ctx.store.fetch(quotation.rfq_id).await?;
    Ok((guard, quotation, rfq))
}

/// Quotations are reviewable until the RFQ is awarded.
pub(crate) fn ensure_reviewable(rfq: &Rfq, action: &str) -> Result<(), ServiceError> {
    if rfq.status == RfqStatus::Awarded {
        return Err(ServiceError::invalid_transition(
            crate::models::EntityKind::Rfq,
            rfq.id,
            rfq.status,
            action,
        ));
    }
    Ok(())
}
