//! # Botfleet Strategy Library
//!
//! This crate contains the trading logic of the system: the static strategy
//! catalog with its typed parameter schemas, and the signal generators that
//! implement each catalog entry.
//!
//! ## Architectural Principles
//!
//! - **Layer 1 Logic:** This is a pure logic crate. It has no knowledge of timers,
//!   feeds or execution. It depends only on `core-types`.
//! - **Strategy Agnostic Engine:** By using the `Strategy` trait, the supervisor and
//!   the backtester can operate on any strategy without knowing its internals.
//! - **Extensibility:** Adding a new strategy means adding a catalog definition, a
//!   module implementing `Strategy`, and an arm in `factory::create_strategy`.
//!
//! ## Public API
//!
//! - `StrategyCatalog`: the registry of `StrategyDefinition`s, and configuration validation.
//! - `Strategy`: the core trait all strategies implement.
//! - `StrategyFactory` / `CatalogStrategyFactory`: builds a strategy for a definition.
//! - `CrossoverDetector`: the incremental moving-average crossover indicator.

// Declare all the modules that constitute this crate.
pub mod catalog;
pub mod dca;
pub mod error;
pub mod factory;
pub mod grid;
pub mod ma_crossover;
pub mod scalper;

// Re-export the key components to create a clean, public-facing API.
pub use catalog::{
    ParameterConstraint, ParameterKind, ParameterSpec, PublishedPerformance, ResolvedParameters,
    StrategyCatalog, StrategyDefinition,
};
pub use dca::DollarCostAveraging;
pub use error::StrategyError;
pub use factory::{create_strategy, CatalogStrategyFactory, StrategyFactory};
pub use grid::GridTrading;
pub use ma_crossover::{Crossover, CrossoverDetector, MovingAverageCrossover};
pub use scalper::RsiScalper;

use core_types::{PriceTick, SignalIntent};

/// The core trait that all trading strategies must implement.
///
/// This trait defines a common interface for the backtester and the bot supervisor,
/// allowing them to be strategy-agnostic.
///
/// The `&mut self` in `evaluate` is crucial, as most strategies need to maintain
/// their own internal state (e.g., a window of recent prices).
/// The `Send + Sync` bounds allow a strategy to live inside the supervisor's
/// shared bot table and move into spawned evaluation tasks.
pub trait Strategy: Send + Sync {
    /// Evaluates the strategy against a new price tick.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(SignalIntent))` - if the strategy's conditions are met to propose a trade.
    /// * `Ok(None)` - if no action should be taken.
    /// * `Err(StrategyError)` - if an error occurs during evaluation.
    fn evaluate(&mut self, tick: &PriceTick) -> Result<Option<SignalIntent>, StrategyError>;
}

/// A boxed strategy trait object.
pub type BoxedStrategy = Box<dyn Strategy>;
