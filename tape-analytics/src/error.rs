//! Error types for bar aggregation and estimation

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors raised by the analytics layer
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalyticsError {
    #[error("Ticks are not sorted: got minute {got} after {current}")]
    UnorderedTicks {
        current: DateTime<Utc>,
        got: DateTime<Utc>,
    },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Degenerate regression: {0}")]
    DegenerateRegression(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Failed to build CPU pool: {0}")]
    PoolBuild(String),

    #[error("CPU worker dropped the job before completing it")]
    WorkerLost,
}

impl AnalyticsError {
    pub fn insufficient(msg: impl Into<String>) -> Self {
        AnalyticsError::InsufficientData(msg.into())
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        AnalyticsError::InvalidParameter(msg.into())
    }
}
