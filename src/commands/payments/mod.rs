pub mod create_payment_plan_command;
pub mod mark_overdue_payments_command;
pub mod record_payment_command;

pub use create_payment_plan_command::{CreatePaymentPlanCommand, InstallmentInput, PlanSchedule};
pub use mark_overdue_payments_command::MarkOverduePaymentsCommand;
pub use record_payment_command::{RecordPaymentCommand, RecordPaymentResult};
