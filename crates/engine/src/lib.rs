//! # Botfleet Engine
//!
//! The live side of the system. The `BotSupervisor` owns every bot instance,
//! runs one evaluation loop per running bot against a market-data feed, records
//! the signals those loops produce in the shared `SignalLedger`, and turns
//! executed signals into trades and refreshed statistics.
//!
//! ## Architectural Principles
//!
//! - **Single Owner:** Bot instances are only ever mutated by the supervisor. Readers
//!   get cloned snapshots, never references into the live table.
//! - **Quiescent Lifecycle:** `stop` and `pause` cancel a bot's loop and wait for it to
//!   exit, so no signal is appended for a bot after either call returns.
//! - **Injected Collaborators:** The clock, the activity policy (delays and
//!   auto-execution), the order executor, the market feed and the strategy factory are
//!   all traits, so tests run the whole engine deterministically.
//! - **Contained Failures:** Errors inside a bot's loop move that bot to `error`. They
//!   never escape into the supervisor or other bots.
//!
//! ## Public API
//!
//! - `BotSupervisor`: lifecycle commands, signal execution and the read model.
//! - `SignalLedger`: the bounded, shared signal log.
//! - `MarketFeed` / `ChannelFeed`: market-data subscriptions.
//! - `ActivityPolicy`: `JitteredActivity` for production, `FixedActivity` for tests.
//! - `EngineError` / `FeedError`: The specific error types that can be returned from this crate.

// Declare the modules that constitute this crate.
pub mod activity;
pub mod error;
mod execution;
pub mod feed;
pub mod ledger;
pub mod supervisor;
mod worker;

// Re-export the key components to provide a clean, public-facing API.
pub use activity::{ActivityPolicy, FixedActivity, JitteredActivity};
pub use error::{EngineError, FeedError};
pub use execution::ExecutionOutcome;
pub use feed::{spawn_random_walk, ChannelFeed, FeedMessage, MarketFeed, Subscription, SubscriptionHandle};
pub use ledger::SignalLedger;
pub use supervisor::{BotSupervisor, SupervisorBuilder};
