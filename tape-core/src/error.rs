//! Error types for the tick tape

use thiserror::Error;

/// Tape-wide error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TapeError {
    #[error("Invalid window: {0}")]
    InvalidWindow(String),

    #[error("Unknown instrument: {0}")]
    UnknownInstrument(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Tick source error: {0}")]
    Source(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TapeError {
    pub fn invalid_window(msg: impl Into<String>) -> Self {
        TapeError::InvalidWindow(msg.into())
    }

    pub fn unknown_instrument(name: impl Into<String>) -> Self {
        TapeError::UnknownInstrument(name.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        TapeError::NotFound(msg.into())
    }

    pub fn source(msg: impl Into<String>) -> Self {
        TapeError::Source(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        TapeError::Internal(msg.into())
    }
}

/// Result type alias for tape operations
pub type TapeResult<T> = Result<T, TapeError>;
