use core_types::ErrorKind;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StrategyError {
    #[error("Strategy '{0}' not found in catalog")]
    NotFound(String),

    #[error("Parameter '{key}' failed validation: {reason}")]
    ValidationFailed { key: String, reason: String },

    #[error("Strategy received invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("An error occurred during indicator calculation: {0}")]
    IndicatorError(String),

    #[error("Strategy of type '{0}' not found or implemented")]
    NotImplemented(String),

    #[error("Catalog already contains a strategy with id '{0}'")]
    DuplicateStrategy(String),
}

impl StrategyError {
    pub(crate) fn validation(key: impl Into<String>, reason: impl Into<String>) -> Self {
        StrategyError::ValidationFailed {
            key: key.into(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            StrategyError::NotFound(_) => ErrorKind::NotFound,
            // A failing indicator surfaces while a bot is evaluating, i.e. during execution.
            StrategyError::IndicatorError(_) => ErrorKind::ExecutionFailed,
            StrategyError::ValidationFailed { .. }
            | StrategyError::InvalidParameters(_)
            | StrategyError::NotImplemented(_)
            | StrategyError::DuplicateStrategy(_) => ErrorKind::ValidationFailed,
        }
    }
}
