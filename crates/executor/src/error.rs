use core_types::ErrorKind;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutorError {
    #[error("Order {client_order_id} was rejected: {reason}")]
    Rejected { client_order_id: Uuid, reason: String },

    #[error("Invalid order: {0}")]
    InvalidOrder(String),

    #[error("Execution venue unavailable: {0}")]
    Unavailable(String),
}

impl ExecutorError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::ExecutionFailed
    }
}
