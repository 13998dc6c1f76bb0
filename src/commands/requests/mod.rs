pub mod approve_request_command;
pub mod confirm_receipt_command;
pub mod create_request_command;
pub mod delete_request_command;
pub mod mark_request_sent_command;
pub mod reject_request_command;
pub mod update_request_command;
pub mod update_request_status_command;

pub use approve_request_command::ApproveRequestCommand;
pub use confirm_receipt_command::ConfirmReceiptCommand;
pub use create_request_command::CreateRequestCommand;
pub use delete_request_command::DeleteRequestCommand;
pub use mark_request_sent_command::MarkRequestSentCommand;
pub use reject_request_command::RejectRequestCommand;
pub use update_request_command::{RequestPatch, UpdateRequestCommand};
pub use update_request_status_command::UpdateRequestStatusCommand;
