use chrono::{DateTime, Utc};
use core_types::{CoreError, ErrorKind};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BacktestError {
    #[error("Strategy '{0}' is not in the catalog.")]
    UnknownStrategy(String),

    #[error("Backtest period is empty: {start} is not before {end}.")]
    EmptyPeriod {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("Historical data for '{symbol}' in the requested range is incomplete or missing.")]
    DataUnavailable { symbol: String },

    #[error("A backtest is already running on this runner.")]
    AlreadyRunning,

    #[error("The backtest was cancelled.")]
    Cancelled,

    #[error("Strategy execution error: {0}")]
    Strategy(#[from] strategies::StrategyError),

    #[error("Analytics calculation error: {0}")]
    Analytics(#[from] analytics::AnalyticsError),

    #[error("Trade bookkeeping error: {0}")]
    Core(#[from] CoreError),

    #[error("Progress bar template error: {0}")]
    ProgressBarTemplate(String),

    #[error("Backtest task failed: {0}")]
    Join(String),
}

impl BacktestError {
    /// Every backtest failure is a job-level failure.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::BacktestFailed
    }
}

impl From<indicatif::style::TemplateError> for BacktestError {
    fn from(error: indicatif::style::TemplateError) -> Self {
        BacktestError::ProgressBarTemplate(error.to_string())
    }
}
