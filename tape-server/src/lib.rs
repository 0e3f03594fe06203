//! Tick tape analytics server
//!
//! A readiness reactor accepts connections and hands each request to a
//! bounded I/O pool; estimator work runs on a separate CPU pool so a heavy
//! statistic never stalls request handling.

pub mod config;
pub mod error;
pub mod pool;
pub mod protocol;
pub mod reactor;
pub mod routes;

use std::sync::Arc;
use tape_analytics::CpuPool;
use tape_core::TickSource;

pub use config::{ConfigError, ServerConfig};
pub use error::{ApiError, ServerError};
pub use pool::{IoPool, PoolError};
pub use protocol::{CorsPolicy, HttpRequest, HttpResponse};
pub use reactor::{Reactor, ReactorHandle, ReactorOptions};
pub use routes::Route;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub source: Arc<dyn TickSource>,
    pub cpu_pool: CpuPool,
    pub cors: CorsPolicy,
    /// Fill silent minutes with flat bars before estimating
    pub fill_missing_minutes: bool,
}

impl AppState {
    pub fn new(source: Arc<dyn TickSource>, cpu_pool: CpuPool, config: &ServerConfig) -> Self {
        Self {
            source,
            cpu_pool,
            cors: CorsPolicy::new(config.allowed_origin.clone()),
            fill_missing_minutes: config.fill_missing_minutes,
        }
    }
}
