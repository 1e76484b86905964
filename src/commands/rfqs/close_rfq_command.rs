use async_trait::async_trait;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::{authorize, Actor, WorkflowCommand},
    commands::{Command, WorkflowContext},
    errors::ServiceError,
    events::TransitionEvent,
    models::{EntityKind, Rfq},
    store::{committed, ChangeSet, EntityStoreExt},
};

/// Stops an open RFQ from taking quotations. Already submitted quotations can
/// still be reviewed.
#[derive(Debug, Clone)]
pub struct CloseRfqCommand {
    pub actor: Actor,
    pub rfq_id: Uuid,
}

#[async_trait]
impl Command for CloseRfqCommand {
    type Result = Rfq;

    #[instrument(skip(self, ctx), fields(rfq_id = %self.rfq_id, actor = %self.actor.id))]
    async fn execute(&self, ctx: &WorkflowContext) -> Result<Self::Result, ServiceError> {
        authorize(&self.actor, WorkflowCommand::CloseRfq, None)?;

        let _guard = ctx.locks.acquire(self.rfq_id).await;
        let mut rfq: Rfq = ctx.store.fetch(self.rfq_id).await?;
        let from = rfq.status;
        rfq.close(ctx.now())?;

        let event = TransitionEvent::changed(
            EntityKind::Rfq,
            rfq.id,
            from,
            rfq.status,
            Some(&self.actor),
            ctx.now(),
        );
        let records = ctx.commit(ChangeSet::new().update(rfq), vec![event]).await?;

        info!(rfq_id = %self.rfq_id, "RFQ closed");
        committed(&records, self.rfq_id)
    }
}
