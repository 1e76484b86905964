use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    commands::{Command, WorkflowContext},
    errors::ServiceError,
    events::TransitionEvent,
    models::{EntityKind, Rfq, RfqStatus},
    store::{ChangeSet, EntityFilter, EntityStoreExt},
};

/// System sweep: closes every open RFQ whose deadline is before `today`.
///
/// Each RFQ is committed on its own; one failure is logged and does not stop the
/// rest. Returns the ids that were closed.
#[derive(Debug, Clone)]
pub struct CloseExpiredRfqsCommand {
    pub today: NaiveDate,
}

#[async_trait]
impl Command for CloseExpiredRfqsCommand {
    type Result = Vec<Uuid>;

    #[instrument(skip(self, ctx), fields(today = %self.today))]
    async fn execute(&self, ctx: &WorkflowContext) -> Result<Self::Result, ServiceError> {
        let candidates: Vec<Rfq> = ctx
            .store
            .find(&EntityFilter::new(EntityKind::Rfq).status(RfqStatus::Open))
            .await?;

        let mut closed = Vec::new();
        for candidate in candidates.iter().filter(|rfq| rfq.is_expired(self.today)) {
            match self.close_one(ctx, candidate.id).await {
                Ok(true) => closed.push(candidate.id),
                Ok(false) => {}
                Err(e) => warn!(rfq_id = %candidate.id, error = %e, "could not close expired RFQ"),
            }
        }

        if !closed.is_empty() {
            info!(count = closed.len(), "Expired RFQs closed");
        }
        Ok(closed)
    }
}

impl CloseExpiredRfqsCommand {
    async fn close_one(&self, ctx: &WorkflowContext, rfq_id: Uuid) -> Result<bool, ServiceError> {
        let _guard = ctx.locks.acquire(rfq_id).await;
        // Re-read under the lock; a purchaser may have closed or awarded it meanwhile.
        let mut rfq: Rfq = ctx.store.fetch(rfq_id).await?;
        if !rfq.is_expired(self.today) {
            return Ok(false);
        }

        let from = rfq.status;
        rfq.close(ctx.now())?;
        let event = TransitionEvent::changed(EntityKind::Rfq, rfq.id, from, rfq.status, None, ctx.now());
        ctx.commit(ChangeSet::new().update(rfq), vec![event]).await?;
        Ok(true)
    }
}
