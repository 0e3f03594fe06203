//! Minimal HTTP/1.x framing
//!
//! One request per connection: the first read is parsed as a whole request
//! and the response is written with `Connection: close`.

pub mod request;
pub mod response;

pub use request::{HttpRequest, ProtocolError, QueryValue};
pub use response::{reason_phrase, CorsPolicy, HttpResponse};
