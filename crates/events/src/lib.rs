//! # Botfleet Events
//!
//! This crate defines the event stream the engine publishes to the presentation
//! layer. Every mutation of a bot, its signals or its trades is announced here.
//!
//! As a Layer 0 crate, it depends only on `core-types` and provides the definitive
//! language for all real-time state synchronization.

// Declare the modules that make up this crate.
pub mod error;
pub mod messages;

// Re-export the core types to provide a clean public API.
pub use error::EventsError;
pub use messages::EngineEvent;
