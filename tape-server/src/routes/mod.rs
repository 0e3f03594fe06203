//! Request routing
//!
//! Paths are matched on their non-empty segments, so trailing and doubled
//! slashes are ignored. `OPTIONS` on any path is a CORS preflight.

pub mod indicators;
pub mod instruments;

use tracing::{error, info};

use crate::error::ApiError;
use crate::protocol::{HttpRequest, HttpResponse, QueryValue};
use crate::AppState;

/// Where a request goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route<'a> {
    /// `OPTIONS` on any path
    Preflight,
    /// `/instruments/{name}`
    TickHistory { instrument: &'a str },
    /// `/instruments/{name}/hurst`
    Hurst { instrument: &'a str },
    /// `/instruments/{name}/permutation-entropy`
    PermutationEntropy { instrument: &'a str },
    NotFound,
}

impl<'a> Route<'a> {
    /// Resolve a method and path to a route
    pub fn resolve(method: &str, path: &'a str) -> Self {
        if method.eq_ignore_ascii_case("OPTIONS") {
            return Route::Preflight;
        }

        let segments: Vec<&'a str> = path.split('/').filter(|s| !s.is_empty()).collect();
        match segments[..] {
            ["instruments", instrument] => Route::TickHistory { instrument },
            ["instruments", instrument, "hurst"] => Route::Hurst { instrument },
            ["instruments", instrument, "permutation-entropy"] => {
                Route::PermutationEntropy { instrument }
            }
            _ => Route::NotFound,
        }
    }
}

/// Turn raw request bytes into a response; never fails
pub async fn handle(state: &AppState, raw: &[u8]) -> HttpResponse {
    let request = match HttpRequest::parse(raw) {
        Ok(request) => request,
        Err(e) => {
            error!("Failed to parse request: {}", e);
            return ApiError::from(e).into_response();
        }
    };

    info!("[HTTP] {} {} {:?}", request.method, request.path, request.query);

    let result = match Route::resolve(&request.method, &request.path) {
        Route::Preflight => Ok(HttpResponse::no_content()),
        Route::TickHistory { instrument } => {
            instruments::tick_history(state, instrument, &request).await
        }
        Route::Hurst { instrument } => indicators::hurst(state, instrument, &request).await,
        Route::PermutationEntropy { instrument } => {
            indicators::permutation_entropy(state, instrument, &request).await
        }
        Route::NotFound => Err(ApiError::not_found(format!("Not found: {}", request.path))),
    };

    result.unwrap_or_else(ApiError::into_response)
}

/// Integer query parameter; `None` when absent
fn int_param(request: &HttpRequest, name: &str) -> Result<Option<i64>, ApiError> {
    match request.query.get(name) {
        None => Ok(None),
        Some(QueryValue::Single(raw)) => raw.trim().parse().map(Some).map_err(|_| {
            ApiError::validation(format!("Invalid query params: {} must be an integer", name))
        }),
        Some(QueryValue::Multi(_)) => Err(ApiError::validation(format!(
            "Invalid query params: {} given more than once",
            name
        ))),
    }
}

/// Positive integer query parameter
fn positive_param(request: &HttpRequest, name: &str) -> Result<Option<usize>, ApiError> {
    match int_param(request, name)? {
        None => Ok(None),
        Some(value) if value > 0 => usize::try_from(value).map(Some).map_err(|_| {
            ApiError::validation(format!("Invalid query params: {} is too large", name))
        }),
        Some(_) => Err(ApiError::validation(format!(
            "Invalid query params: {} must be positive",
            name
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_routes() {
        assert_eq!(
            Route::resolve("GET", "/instruments/ES"),
            Route::TickHistory { instrument: "ES" }
        );
        assert_eq!(
            Route::resolve("GET", "/instruments/NQ/hurst"),
            Route::Hurst { instrument: "NQ" }
        );
        assert_eq!(
            Route::resolve("GET", "/instruments/YM/permutation-entropy"),
            Route::PermutationEntropy { instrument: "YM" }
        );
    }

    #[test]
    fn test_resolve_ignores_empty_segments() {
        assert_eq!(
            Route::resolve("GET", "//instruments//ES/"),
            Route::TickHistory { instrument: "ES" }
        );
    }

    #[test]
    fn test_resolve_not_found() {
        assert_eq!(Route::resolve("GET", "/"), Route::NotFound);
        assert_eq!(Route::resolve("GET", "/instruments"), Route::NotFound);
        assert_eq!(Route::resolve("GET", "/instruments/ES/volume"), Route::NotFound);
        assert_eq!(Route::resolve("GET", "/markets/ES"), Route::NotFound);
    }

    #[test]
    fn test_options_is_always_preflight() {
        assert_eq!(Route::resolve("OPTIONS", "/anything/at/all"), Route::Preflight);
        assert_eq!(Route::resolve("options", "/instruments/ES"), Route::Preflight);
    }

    #[test]
    fn test_other_methods_route_by_path() {
        assert_eq!(
            Route::resolve("POST", "/instruments/ES"),
            Route::TickHistory { instrument: "ES" }
        );
    }

    #[test]
    fn test_positive_param() {
        let request =
            HttpRequest::parse(b"GET /x?a=5&b=0&c=-1&d=abc&e=1&e=2 HTTP/1.1\r\n\r\n").unwrap();

        assert_eq!(positive_param(&request, "a").unwrap(), Some(5));
        assert_eq!(positive_param(&request, "missing").unwrap(), None);
        for name in ["b", "c", "d", "e"] {
            assert_eq!(positive_param(&request, name).unwrap_err().status(), 400, "{}", name);
        }
    }
}
