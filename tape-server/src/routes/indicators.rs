//! Estimator endpoints
//!
//! Both routes aggregate the requested window into minute bars on the I/O
//! worker, then hand the closes to the CPU pool and await the number.

use tape_analytics::{
    closing_prices, minute_bars, EntropyConfig, HurstEstimator, PermutationEntropy,
};
use tape_core::{Instrument, TickWindow};
use tracing::debug;

use super::instruments::history_window;
use super::positive_param;
use crate::error::ApiError;
use crate::protocol::{HttpRequest, HttpResponse};
use crate::AppState;

/// Parameters shared by both estimators
struct SeriesQuery {
    instrument: Instrument,
    window: TickWindow,
    workers: usize,
}

impl SeriesQuery {
    fn parse(name: &str, request: &HttpRequest) -> Result<Self, ApiError> {
        let instrument: Instrument = name.parse()?;
        let window = history_window(request)?;
        let workers = positive_param(request, "workers")?
            .ok_or_else(|| ApiError::validation("Invalid query params: workers is required"))?;

        Ok(Self {
            instrument,
            window,
            workers,
        })
    }
}

/// Minute-bar closes for the query window
async fn load_closes(state: &AppState, query: &SeriesQuery) -> Result<Vec<f64>, ApiError> {
    let ticks = state.source.fetch(query.instrument, query.window).await?;
    let bars = minute_bars(ticks, state.fill_missing_minutes)?;

    debug!(
        "{} {:?}: {} minute bars for {} workers",
        query.instrument,
        query.window,
        bars.len(),
        query.workers
    );

    Ok(closing_prices(&bars))
}

/// GET /instruments/{name}/hurst?minutes=N&workers=W
pub async fn hurst(
    state: &AppState,
    name: &str,
    request: &HttpRequest,
) -> Result<HttpResponse, ApiError> {
    let query = SeriesQuery::parse(name, request)?;
    let closes = load_closes(state, &query).await?;

    let pool = state.cpu_pool.clone();
    let workers = query.workers;
    let h = state
        .cpu_pool
        .run(move || HurstEstimator::default().estimate(&closes, &pool, workers))
        .await??;

    Ok(HttpResponse::json(200, &h))
}

/// GET /instruments/{name}/permutation-entropy?minutes=N&workers=W[&m=M&tau=T]
pub async fn permutation_entropy(
    state: &AppState,
    name: &str,
    request: &HttpRequest,
) -> Result<HttpResponse, ApiError> {
    let query = SeriesQuery::parse(name, request)?;

    let defaults = EntropyConfig::default();
    let estimator = PermutationEntropy::new(EntropyConfig {
        dimension: positive_param(request, "m")?.unwrap_or(defaults.dimension),
        delay: positive_param(request, "tau")?.unwrap_or(defaults.delay),
    })?;

    let closes = load_closes(state, &query).await?;

    let pool = state.cpu_pool.clone();
    let workers = query.workers;
    let pe = state
        .cpu_pool
        .run(move || estimator.estimate(&closes, &pool, workers))
        .await??;

    Ok(HttpResponse::json(200, &pe))
}
