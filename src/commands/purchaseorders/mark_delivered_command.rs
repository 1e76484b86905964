use async_trait::async_trait;
use tracing::{info, instrument};
use uuid::Uuid;

use super::transition_purchase_order;
use crate::{
    auth::{Actor, WorkflowCommand},
    commands::{Command, WorkflowContext},
    errors::ServiceError,
    models::PurchaseOrder,
};

#[derive(Debug, Clone)]
pub struct MarkDeliveredCommand {
    pub actor: Actor,
    pub purchase_order_id: Uuid,
}

#[async_trait]
impl Command for MarkDeliveredCommand {
    type Result = PurchaseOrder;

    #[instrument(skip(self, ctx), fields(purchase_order_id = %self.purchase_order_id, actor = %self.actor.id))]
    async fn execute(&self, ctx: &WorkflowContext) -> Result<Self::Result, ServiceError> {
        let now = ctx.now();
        let order = transition_purchase_order(
            ctx,
            &self.actor,
            WorkflowCommand::MarkDelivered,
            self.purchase_order_id,
            |order| order.mark_delivered(now),
        )
        .await?;

        info!(purchase_order_id = %order.id, po_number = %order.po_number, "Purchase order delivered");
        Ok(order)
    }
}
