//! Core types for the tick tape analytics server
//!
//! This crate defines the shared data structures used across the workspace,
//! including instruments, ticks, minute bars and the tick source abstraction.

pub mod error;
pub mod instrument;
pub mod source;
pub mod tick;

pub use error::{TapeError, TapeResult};
pub use instrument::Instrument;
pub use source::{TickSource, TickWindow};
pub use tick::{MinuteBar, Tick};
