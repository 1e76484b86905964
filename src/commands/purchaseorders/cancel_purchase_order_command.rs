use async_trait::async_trait;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use super::transition_purchase_order;
use crate::{
    auth::{Actor, WorkflowCommand},
    commands::{validate_not_blank, Command, WorkflowContext},
    errors::ServiceError,
    models::PurchaseOrder,
};

#[derive(Debug, Clone, Validate)]
pub struct CancelPurchaseOrderCommand {
    pub actor: Actor,
    pub purchase_order_id: Uuid,
    #[validate(
        length(max = 1000, message = "Reason cannot exceed 1000 characters"),
        custom = "validate_not_blank"
    )]
    pub reason: String,
}

#[async_trait]
impl Command for CancelPurchaseOrderCommand {
    type Result = PurchaseOrder;

    #[instrument(skip(self, ctx), fields(purchase_order_id = %self.purchase_order_id, actor = %self.actor.id))]
    async fn execute(&self, ctx: &WorkflowContext) -> Result<Self::Result, ServiceError> {
        self.validate()?;

        let now = ctx.now();
        let reason = self.reason.trim().to_string();
        let order = transition_purchase_order(
            ctx,
            &self.actor,
            WorkflowCommand::CancelPurchaseOrder,
            self.purchase_order_id,
            move |order| order.cancel(reason, now),
        )
        .await?;

        info!(purchase_order_id = %order.id, reason = %self.reason, "Purchase order cancelled");
        Ok(order)
    }
}
