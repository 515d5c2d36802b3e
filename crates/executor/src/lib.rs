//! # Botfleet Executor Crate
//!
//! This crate defines the contract between the engine and whatever actually fills
//! orders. The engine only needs "submit an order, eventually get a fill price and
//! time, or an execution error".
//!
//! ## Architectural Principles
//!
//! - **Execution Abstraction:** The `OrderExecutor` trait allows the supervisor and the
//!   backtester to be completely agnostic about whether orders go to a simulation or a
//!   live venue.
//! - **No Portfolio State:** Executors only price and time fills. Trade bookkeeping is
//!   owned by the bot that submitted the order.
//!
//! ## Public API
//!
//! - `OrderExecutor`: The core trait for all execution venues.
//! - `SimulatedExecutor`: The "virtual exchange" with configurable latency and slippage.
//! - `OrderRequest` / `Fill`: the request and receipt types.
//! - `ExecutorError`: The specific error types that can be returned from this crate.

// Declare the modules that constitute this crate.
pub mod error;
pub mod exchange;
pub mod order;

// Re-export the key components to provide a clean, public-facing API.
pub use error::ExecutorError;
pub use exchange::{OrderExecutor, SimulatedExecutor};
pub use order::{Fill, OrderRequest};
