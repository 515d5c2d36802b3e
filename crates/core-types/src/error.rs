use thiserror::Error;

/// The failure categories every public operation of the engine reports.
///
/// Crate-specific error enums map onto one of these through their `kind()`
/// method, so callers can react to the category without depending on the
/// concrete error type of every layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Unknown bot, signal, trade or strategy id.
    NotFound,
    /// A configuration or parameter violates its spec.
    ValidationFailed,
    /// The requested lifecycle change is not allowed from the current state.
    InvalidTransition,
    /// A backtest job failed.
    BacktestFailed,
    /// The execution collaborator rejected an order.
    ExecutionFailed,
    /// The market-data feed could not serve a subscription.
    FeedUnavailable,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Invalid input for {0}: {1}")]
    InvalidInput(String, String),

    #[error("Trade {trade_id} cannot move from {from:?} to {to:?}")]
    InvalidTradeTransition {
        trade_id: uuid::Uuid,
        from: crate::TradeStatus,
        to: crate::TradeStatus,
    },
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::InvalidInput(..) => ErrorKind::ValidationFailed,
            CoreError::InvalidTradeTransition { .. } => ErrorKind::InvalidTransition,
        }
    }
}
