//! Tick history endpoint

use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;
use tape_core::{Instrument, Tick, TickWindow};

use super::int_param;
use crate::error::ApiError;
use crate::protocol::{HttpRequest, HttpResponse};
use crate::AppState;

/// Tick as served to clients
#[derive(Debug, Serialize)]
pub struct TickView {
    pub price: f64,
    /// Unix seconds
    pub timestamp: i64,
}

impl From<&Tick> for TickView {
    fn from(tick: &Tick) -> Self {
        Self {
            price: tick.price.to_f64().unwrap_or(f64::NAN),
            timestamp: tick.timestamp.timestamp(),
        }
    }
}

/// Window from `minutes`, or failing that `limit`
pub(super) fn history_window(request: &HttpRequest) -> Result<TickWindow, ApiError> {
    if let Some(minutes) = int_param(request, "minutes")? {
        return Ok(TickWindow::minutes(minutes)?);
    }
    if let Some(limit) = int_param(request, "limit")? {
        return Ok(TickWindow::count(limit)?);
    }
    Err(ApiError::validation("Invalid query params: minutes is required"))
}

/// GET /instruments/{name}?minutes=N
///
/// Ticks inside the window, newest first.
pub async fn tick_history(
    state: &AppState,
    name: &str,
    request: &HttpRequest,
) -> Result<HttpResponse, ApiError> {
    let instrument: Instrument = name.parse()?;
    let window = history_window(request)?;

    let ticks = state.source.fetch(instrument, window).await?;
    let body: Vec<TickView> = ticks.iter().rev().map(TickView::from).collect();

    Ok(HttpResponse::json(200, &body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use rust_decimal_macros::dec;

    fn request(target: &str) -> HttpRequest {
        HttpRequest::parse(format!("GET {} HTTP/1.1\r\n\r\n", target).as_bytes()).unwrap()
    }

    #[test]
    fn test_window_from_minutes_or_limit() {
        assert_eq!(
            history_window(&request("/instruments/ES?minutes=5")).unwrap(),
            TickWindow::Minutes(5)
        );
        assert_eq!(
            history_window(&request("/instruments/ES?limit=20")).unwrap(),
            TickWindow::Count(20)
        );
        assert_eq!(
            history_window(&request("/instruments/ES?limit=20&minutes=3")).unwrap(),
            TickWindow::Minutes(3)
        );
    }

    #[test]
    fn test_window_rejects_bad_input() {
        for target in [
            "/instruments/ES",
            "/instruments/ES?minutes=",
            "/instruments/ES?minutes=abc",
            "/instruments/ES?minutes=0",
            "/instruments/ES?minutes=-4",
            "/instruments/ES?limit=0",
        ] {
            let err = history_window(&request(target)).unwrap_err();
            assert_eq!(err.status(), 400, "{}", target);
        }
    }

    #[test]
    fn test_tick_view() {
        let tick = Tick::new(DateTime::from_timestamp(1_700_000_000, 0).unwrap(), dec!(4321.25));
        let view = TickView::from(&tick);

        assert_eq!(view.price, 4321.25);
        assert_eq!(view.timestamp, 1_700_000_000);
        assert_eq!(
            serde_json::to_string(&view).unwrap(),
            r#"{"price":4321.25,"timestamp":1700000000}"#
        );
    }
}
