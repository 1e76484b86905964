pub mod approve_invoice_command;
pub mod reject_invoice_command;
pub mod submit_invoice_command;

pub use approve_invoice_command::ApproveInvoiceCommand;
pub use reject_invoice_command::RejectInvoiceCommand;
pub use submit_invoice_command::SubmitInvoiceCommand;
