use core_types::ErrorKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EventsError {
    #[error("Failed to serialize event message: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EventsError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::ValidationFailed
    }
}
