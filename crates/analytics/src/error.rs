use core_types::ErrorKind;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalyticsError {
    #[error("Invalid input for performance calculation: {0}")]
    InvalidInput(String),

    #[error("Error in calculation: {0}")]
    Calculation(String),
}

impl AnalyticsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AnalyticsError::InvalidInput(_) => ErrorKind::ValidationFailed,
            // Summaries are only produced for backtest reports.
            AnalyticsError::Calculation(_) => ErrorKind::BacktestFailed,
        }
    }
}
