//! Request parsing

use std::borrow::Cow;
use std::collections::HashMap;
use thiserror::Error;

/// Request framing errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Malformed request line: {0:?}")]
    MalformedRequestLine(String),
}

/// A query parameter: a single value, or every value when the key repeats
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryValue {
    Single(String),
    Multi(Vec<String>),
}

/// Parsed HTTP request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: String,
    /// Raw request target as sent
    pub target: String,
    pub version: String,
    /// Target path without query or fragment
    pub path: String,
    pub query: HashMap<String, QueryValue>,
    /// Header names are stored lowercased
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl HttpRequest {
    /// Parse the raw bytes of one request
    ///
    /// Bytes decode as ISO-8859-1, so every byte maps to one character and
    /// decoding cannot fail. Headers end at the first blank line; whatever
    /// follows is the body.
    pub fn parse(raw: &[u8]) -> Result<Self, ProtocolError> {
        let text = decode(raw);

        let (head, body) = match text.split_once("\r\n\r\n") {
            Some((head, body)) => (head, body),
            None => (&*text, ""),
        };

        let mut lines = head.split("\r\n");
        let request_line = lines.next().unwrap_or_default();

        let parts: Vec<&str> = request_line.split(' ').collect();
        if parts.len() < 3 {
            return Err(ProtocolError::MalformedRequestLine(request_line.to_string()));
        }
        let (method, target, version) = (parts[0], parts[1], parts[2]);

        let mut headers = HashMap::new();
        for line in lines {
            if let Some((name, value)) = line.split_once(':') {
                headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
            }
        }

        let (path, query) = split_target(target);

        Ok(Self {
            method: method.to_string(),
            target: target.to_string(),
            version: version.to_string(),
            path: path.to_string(),
            query: parse_query(query),
            headers,
            body: body.to_string(),
        })
    }
}

/// ISO-8859-1 decode; borrows when the bytes are plain ASCII
fn decode(raw: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(raw) {
        Ok(text) if raw.is_ascii() => Cow::Borrowed(text),
        _ => Cow::Owned(raw.iter().copied().map(char::from).collect()),
    }
}

/// Split a request target into path and raw query string
fn split_target(target: &str) -> (&str, &str) {
    let target = target.split('#').next().unwrap_or_default();

    // Absolute-form targets carry a scheme and authority before the path
    let target = match target.split_once("://") {
        Some((_, rest)) => rest.find('/').map_or("", |at| &rest[at..]),
        None => target,
    };

    target.split_once('?').unwrap_or((target, ""))
}

fn parse_query(query: &str) -> HashMap<String, QueryValue> {
    let mut grouped: HashMap<String, Vec<String>> = HashMap::new();
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        grouped.entry(key.into_owned()).or_default().push(value.into_owned());
    }

    grouped
        .into_iter()
        .map(|(key, mut values)| {
            let value = if values.len() == 1 {
                QueryValue::Single(values.remove(0))
            } else {
                QueryValue::Multi(values)
            };
            (key, value)
        })
        .collect()
}
