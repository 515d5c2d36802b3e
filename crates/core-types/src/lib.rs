//! # Botfleet Core Types
//!
//! Layer 0 of the workspace. Every other crate speaks in terms of the types
//! defined here: bot configurations and instances, signals, trades, price ticks
//! and the statistics snapshot a bot carries.
//!
//! This crate has no knowledge of strategies, scheduling or execution.

pub mod bot;
pub mod clock;
pub mod enums;
pub mod error;
pub mod structs;

// Re-export the core types to provide a clean public API.
pub use bot::{
    BotConfiguration, BotInstance, BotStatistics, DailyReturn, EquityPoint, PerformanceRecord,
    RiskManagement, TradingSchedule,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use enums::{BotStatus, OrderSide, ParamValue, RiskLevel, SignalKind, StrategyCategory, TradeStatus};
pub use error::{CoreError, ErrorKind};
pub use structs::{PriceTick, Signal, SignalIntent, Trade, TradeExit};

use std::collections::BTreeMap;
use uuid::Uuid;

/// Identity of a bot instance.
pub type BotId = Uuid;
/// Identity of a generated signal.
pub type SignalId = Uuid;
/// Identity of a trade.
pub type TradeId = Uuid;

/// A strategy parameter mapping, key -> concrete value.
pub type ParameterMap = BTreeMap<String, ParamValue>;
