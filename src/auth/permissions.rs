/*!
 * # Workflow Commands
 *
 * Every action the authorization gate decides on. Names match the engine
 * operations and appear in denial messages and logs.
 */

use serde::{Deserialize, Serialize};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
    strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WorkflowCommand {
    RegisterSupplier,
    UpdateSupplierContact,
    ApproveSupplier,
    RejectSupplier,
    CreateRfq,
    CloseRfq,
    SubmitQuotation,
    ApproveQuotation,
    RejectQuotation,
    GeneratePurchaseOrder,
    SendPurchaseOrder,
    ConfirmPurchaseOrder,
    MarkDelivered,
    CancelPurchaseOrder,
    SubmitInvoice,
    ApproveInvoice,
    RejectInvoice,
    CreatePaymentPlan,
    RecordPayment,
    ViewReports,
}

impl WorkflowCommand {
    /// Commands where a provider must own the supplier involved.
    pub fn is_owner_scoped(&self) -> bool {
        matches!(
            self,
            WorkflowCommand::UpdateSupplierContact
                | WorkflowCommand::SubmitQuotation
                | WorkflowCommand::ConfirmPurchaseOrder
                | WorkflowCommand::SubmitInvoice
        )
    }
}
