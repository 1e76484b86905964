/*!
 * # Authorization Gate
 *
 * Static role → command table plus the ownership rule for providers.
 */

use lazy_static::lazy_static;
use std::collections::{HashMap, HashSet};
use tracing::warn;
use uuid::Uuid;

use super::{Actor, Role, WorkflowCommand};
use crate::errors::ServiceError;

lazy_static! {
    pub static ref GATE: HashMap<Role, HashSet<WorkflowCommand>> = {
        use WorkflowCommand::*;

        let mut gate = HashMap::new();

        // Admin can do everything
        gate.insert(
            Role::Admin,
            <WorkflowCommand as strum::IntoEnumIterator>::iter().collect(),
        );

        gate.insert(
            Role::Purchaser,
            HashSet::from([
                ApproveSupplier,
                RejectSupplier,
                CreateRfq,
                CloseRfq,
                ApproveQuotation,
                RejectQuotation,
                GeneratePurchaseOrder,
                SendPurchaseOrder,
                CancelPurchaseOrder,
                MarkDelivered,
                ViewReports,
            ]),
        );

        gate.insert(
            Role::Finance,
            HashSet::from([
                ApproveInvoice,
                RejectInvoice,
                CreatePaymentPlan,
                RecordPayment,
                ViewReports,
            ]),
        );

        gate.insert(
            Role::Provider,
            HashSet::from([
                RegisterSupplier,
                UpdateSupplierContact,
                SubmitQuotation,
                ConfirmPurchaseOrder,
                SubmitInvoice,
            ]),
        );

        gate
    };
}

/// Pure role check.
pub fn can_perform(role: Role, command: WorkflowCommand) -> bool {
    GATE.get(&role)
        .map(|commands| commands.contains(&command))
        .unwrap_or(false)
}

/// Role check plus ownership: a provider may only act for suppliers it owns.
///
/// `owner` is the owner of the supplier the command touches, when there is one.
pub fn authorize(
    actor: &Actor,
    command: WorkflowCommand,
    owner: Option<Uuid>,
) -> Result<(), ServiceError> {
    if !can_perform(actor.role, command) {
        warn!(actor = %actor.id, role = %actor.role, %command, "command denied by role");
        return Err(ServiceError::Unauthorized(format!(
            "role {} may not {}",
            actor.role, command
        )));
    }

    if actor.role == Role::Provider && command.is_owner_scoped() {
        if let Some(owner) = owner {
            if owner != actor.id {
                warn!(actor = %actor.id, %command, "command denied: supplier owned by another actor");
                return Err(ServiceError::Unauthorized(format!(
                    "actor {} does not act for this supplier",
                    actor.id
                )));
            }
        }
    }

    Ok(())
}
