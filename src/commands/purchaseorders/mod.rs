use uuid::Uuid;

use crate::{
    auth::{authorize, Actor, WorkflowCommand},
    commands::WorkflowContext,
    errors::ServiceError,
    events::TransitionEvent,
    models::{EntityKind, PurchaseOrder, Supplier},
    store::{committed, ChangeSet, EntityStoreExt},
};

pub mod cancel_purchase_order_command;
pub mod confirm_purchase_order_command;
pub mod generate_purchase_order_command;
pub mod mark_delivered_command;
pub mod send_purchase_order_command;

pub use cancel_purchase_order_command::CancelPurchaseOrderCommand;
pub use confirm_purchase_order_command::ConfirmPurchaseOrderCommand;
pub use generate_purchase_order_command::{GeneratePurchaseOrderCommand, LineItemInput};
pub use mark_delivered_command::MarkDeliveredCommand;
pub use send_purchase_order_command::SendPurchaseOrderCommand;

/// Shared body of the lifecycle commands: gate, lock the order, load it, apply
/// `step` and commit with one transition event.
///
/// For owner-scoped commands the supplier of the order is loaded and the actor
/// must own it.
pub(crate) async fn transition_purchase_order<F>(
    ctx: &WorkflowContext,
    actor: &Actor,
    command: WorkflowCommand,
    purchase_order_id: Uuid,
    step: F,
) -> Result<PurchaseOrder, ServiceError>
where
    F: FnOnce(&mut PurchaseOrder) -> Result<(), ServiceError> + Send,
{
    authorize(actor, command, None)?;

    let _guard = ctx.locks.acquire(purchase_order_id).await;
    let mut order: PurchaseOrder = ctx.store.fetch(purchase_order_id).await?;
    if command.is_owner_scoped() {
        let supplier: Supplier = ctx.store.fetch(order.supplier_id).await?;
        authorize(actor, command, Some(supplier.owner_id))?;
    }

    let from = order.status;
    step(&mut order)?;

    let event = TransitionEvent::changed(
        EntityKind::PurchaseOrder,
        order.id,
        from,
        order.status,
        Some(actor),
        ctx.now(),
    );
    let records = ctx.commit(ChangeSet::new().update(order), vec![event]).await?;
    committed(&records, purchase_order_id)
}
