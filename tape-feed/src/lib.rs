//! Tick feed for the analytics server
//!
//! Provides the in-memory [`MemoryTickStore`] that backs the `TickSource`
//! trait, and the [`PriceGenerator`] that keeps the tape moving with an
//! autoregressive random walk.

pub mod generator;
pub mod store;

pub use generator::{FeedConfig, PriceGenerator};
pub use store::MemoryTickStore;
