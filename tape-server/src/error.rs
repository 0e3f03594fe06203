//! Error types for the server
//!
//! [`ApiError`] is the request-level taxonomy; every variant knows its HTTP
//! status and renders a `{"error": ...}` body. [`ServerError`] covers failures
//! that stop the process itself.

use serde::Serialize;
use tape_analytics::AnalyticsError;
use tape_core::TapeError;
use thiserror::Error;
use tracing::{error, warn};

use crate::config::ConfigError;
use crate::pool::PoolError;
use crate::protocol::{HttpResponse, ProtocolError};

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Request-level failures
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InsufficientData(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ApiError::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        ApiError::NotFound(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        ApiError::Internal(msg.into())
    }

    /// HTTP status for this error
    pub fn status(&self) -> u16 {
        match self {
            ApiError::Validation(_) | ApiError::InsufficientData(_) => 400,
            ApiError::NotFound(_) => 404,
            ApiError::Protocol(_) | ApiError::Internal(_) => 500,
        }
    }

    /// Render the error, logging it at a level matching its status
    pub fn into_response(self) -> HttpResponse {
        let status = self.status();
        let message = match &self {
            ApiError::Protocol(_) | ApiError::Internal(_) => {
                error!("Request failed: {}", self);
                "Internal Server Error".to_string()
            }
            _ => {
                warn!("Request rejected ({}): {}", status, self);
                self.to_string()
            }
        };

        HttpResponse::json(status, &ErrorResponse { error: message })
    }
}

impl From<TapeError> for ApiError {
    fn from(e: TapeError) -> Self {
        match e {
            TapeError::InvalidWindow(msg) => ApiError::Validation(msg),
            TapeError::UnknownInstrument(name) => {
                ApiError::NotFound(format!("Unknown instrument: {}", name))
            }
            TapeError::NotFound(msg) => ApiError::NotFound(msg),
            TapeError::Source(_) | TapeError::Internal(_) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<AnalyticsError> for ApiError {
    fn from(e: AnalyticsError) -> Self {
        match e {
            AnalyticsError::InsufficientData(_) | AnalyticsError::DegenerateRegression(_) => {
                ApiError::InsufficientData(e.to_string())
            }
            AnalyticsError::InvalidParameter(msg) => ApiError::Validation(msg),
            AnalyticsError::UnorderedTicks { .. }
            | AnalyticsError::PoolBuild(_)
            | AnalyticsError::WorkerLost => ApiError::Internal(e.to_string()),
        }
    }
}

/// Failures that stop the server
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Pool error: {0}")]
    Pool(#[from] PoolError),

    #[error("Analytics error: {0}")]
    Analytics(#[from] AnalyticsError),
}
