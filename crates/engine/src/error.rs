use core_types::{BotId, BotStatus, CoreError, ErrorKind, SignalId, TradeId};
use executor::ExecutorError;
use strategies::StrategyError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeedError {
    #[error("Market feed is closed")]
    Closed,

    #[error("Subscription to '{symbol}' failed: {reason}")]
    Unavailable { symbol: String, reason: String },
}

impl FeedError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::FeedUnavailable
    }
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Bot '{0}' not found in the supervisor.")]
    BotNotFound(BotId),

    #[error("Signal '{0}' not found in the ledger.")]
    SignalNotFound(SignalId),

    #[error("Trade '{trade_id}' not found for bot '{bot_id}'.")]
    TradeNotFound { bot_id: BotId, trade_id: TradeId },

    #[error("Cannot {action} bot '{bot_id}' while it is {status}.")]
    InvalidTransition {
        action: &'static str,
        bot_id: BotId,
        status: BotStatus,
    },

    #[error("Strategy error: {0}")]
    Strategy(#[from] StrategyError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutorError),

    #[error("Market feed error: {0}")]
    Feed(#[from] FeedError),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::BotNotFound(_)
            | EngineError::SignalNotFound(_)
            | EngineError::TradeNotFound { .. } => ErrorKind::NotFound,
            EngineError::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            EngineError::Strategy(e) => e.kind(),
            EngineError::Execution(e) => e.kind(),
            EngineError::Feed(e) => e.kind(),
            EngineError::Core(e) => e.kind(),
        }
    }
}
