//! # Botfleet Analytics Engine
//!
//! This crate turns trading activity into numbers. It acts as the "unbiased judge"
//! of the system: the supervisor uses it to refresh a bot's statistics after every
//! trade event, and the backtester uses it to summarise a simulated run.
//!
//! ## Architectural Principles
//!
//! - **Layer 1 Logic:** This is a pure logic crate. It has no knowledge of external systems.
//!   It depends only on `core-types` (Layer 0).
//! - **Stateless Calculation:** Both engines are stateless calculators. Statistics are
//!   always recomputed wholesale from the full trade list, never patched incrementally,
//!   so computing twice over the same input yields identical output.
//!
//! ## Public API
//!
//! - `StatisticsEngine`: trade list -> `BotStatistics`, equity curve -> daily returns.
//! - `AnalyticsEngine`: trades + equity curve -> `PerformanceSummary` for backtests.
//! - `AnalyticsError`: The specific error types that can be returned from this crate.

// Declare the modules that constitute this crate.
pub mod engine;
pub mod error;
pub mod report;
pub mod statistics;

// Re-export the key components to create a clean, public-facing API.
pub use engine::AnalyticsEngine;
pub use error::AnalyticsError;
pub use report::PerformanceSummary;
pub use statistics::StatisticsEngine;
