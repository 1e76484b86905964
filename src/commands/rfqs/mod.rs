pub mod close_expired_rfqs_command;
pub mod close_rfq_command;
pub mod create_rfq_command;

pub use close_expired_rfqs_command::CloseExpiredRfqsCommand;
pub use close_rfq_command::CloseRfqCommand;
pub use create_rfq_command::CreateRfqCommand;
