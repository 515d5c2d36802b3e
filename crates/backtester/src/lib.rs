//! # Botfleet Backtester
//!
//! Replays a price history through a freshly built strategy and summarises the
//! simulated trades with the analytics engine.
//!
//! ## Architectural Principles
//!
//! - **Same Strategies as Live:** Strategies are built through the same `StrategyFactory`
//!   the supervisor uses, so a backtest exercises exactly the code a bot would run.
//! - **Pluggable History:** Prices come from a `HistoricalData` source. The bundled
//!   `SyntheticHistory` is a seeded random walk, so reports are reproducible.
//! - **One Job at a Time:** A `BacktestRunner` rejects a request while another one is in
//!   flight, and never publishes a partial report.
//!
//! ## Public API
//!
//! - `BacktestRunner`: `run`, `run_until_cancelled`, `spawn` and the `is_backtesting` flag.
//! - `BacktestRequest` / `BacktestReport`: the job's input and output.
//! - `HistoricalData` / `SyntheticHistory`: price sources.
//! - `BacktestError`: The specific error types that can be returned from this crate.

// Declare the modules that constitute this crate.
pub mod error;
pub mod history;
pub mod report;
pub mod runner;

// Re-export the key components to provide a clean, public-facing API.
pub use error::BacktestError;
pub use history::{HistoricalData, SyntheticHistory};
pub use report::{BacktestReport, BacktestRequest};
pub use runner::{BacktestJob, BacktestRunner};
