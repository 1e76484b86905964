pub mod approve_supplier_command;
pub mod register_supplier_command;
pub mod reject_supplier_command;
pub mod update_supplier_contact_command;

pub use approve_supplier_command::ApproveSupplierCommand;
pub use register_supplier_command::RegisterSupplierCommand;
pub use reject_supplier_command::RejectSupplierCommand;
pub use update_supplier_contact_command::UpdateSupplierContactCommand;
