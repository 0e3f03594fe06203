//! Response rendering

use serde::Serialize;
use tracing::error;

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
const APPLICATION_JSON: &str = "application/json; charset=utf-8";

/// CORS headers attached to every response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorsPolicy {
    pub allowed_origin: String,
}

impl CorsPolicy {
    pub fn new(allowed_origin: impl Into<String>) -> Self {
        Self {
            allowed_origin: allowed_origin.into(),
        }
    }

    fn headers(&self) -> [(&'static str, String); 4] {
        [
            ("Access-Control-Allow-Origin", self.allowed_origin.clone()),
            ("Access-Control-Allow-Credentials", "true".to_string()),
            ("Access-Control-Allow-Methods", "GET, POST, OPTIONS".to_string()),
            ("Access-Control-Allow-Headers", "Content-Type, Authorization".to_string()),
        ]
    }
}

/// Reason phrase for a status code; unknown codes get "OK"
pub fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        204 => "No Content",
        400 => "Bad Request",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "OK",
    }
}

/// An HTTP response ready to be rendered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: String,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, content_type: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            content_type: content_type.into(),
            body: body.into(),
        }
    }

    /// Plain UTF-8 text response
    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self::new(status, TEXT_PLAIN, body.into())
    }

    /// JSON response; a value that fails to serialize becomes a 500
    pub fn json<T: Serialize + ?Sized>(status: u16, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => Self::new(status, APPLICATION_JSON, body),
            Err(e) => {
                error!("Failed to serialize response body: {}", e);
                Self::new(
                    500,
                    APPLICATION_JSON,
                    br#"{"error":"Internal Server Error"}"#.to_vec(),
                )
            }
        }
    }

    /// Empty 204 response for preflight requests
    pub fn no_content() -> Self {
        Self::text(204, "")
    }

    /// Render status line, headers and body
    ///
    /// Header order is fixed: Content-Type, Content-Length, Connection, then
    /// the CORS set. Every response closes the connection.
    pub fn to_bytes(&self, cors: &CorsPolicy) -> Vec<u8> {
        let mut out = format!("HTTP/1.1 {} {}\r\n", self.status, reason_phrase(self.status));
        out.push_str(&format!("Content-Type: {}\r\n", self.content_type));
        out.push_str(&format!("Content-Length: {}\r\n", self.body.len()));
        out.push_str("Connection: close\r\n");
        for (name, value) in cors.headers() {
            out.push_str(&format!("{}: {}\r\n", name, value));
        }
        out.push_str("\r\n");

        let mut bytes = out.into_bytes();
        bytes.extend_from_slice(&self.body);
        bytes
    }
}
