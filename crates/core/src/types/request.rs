//! Unsigned request intents and signed, ready-to-send requests.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use super::exchange::HttpMethod;

/// Insertion-ordered request parameters.
///
/// Order matters for query-string signing: the canonical string is built in
/// the order the caller supplied the parameters.
pub type Params = Map<String, Value>;

/// The caller's description of a call, before any signing.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestIntent {
    pub method: HttpMethod,
    /// Path relative to the exchange base URL, e.g. `/api/v3/order`.
    pub endpoint: String,
    pub params: Params,
    /// Public calls go out unsigned.
    pub is_public: bool,
}

impl RequestIntent {
    pub fn new(method: HttpMethod, endpoint: impl Into<String>, params: Params) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            params,
            is_public: false,
        }
    }

    pub fn public(mut self, is_public: bool) -> Self {
        self.is_public = is_public;
        self
    }

    /// Parameters flattened to string pairs, in order.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.params
            .iter()
            .map(|(k, v)| (k.clone(), render_param(v)))
            .collect()
    }
}

/// Render a parameter value for a query string or form body.
///
/// Strings go out verbatim, other scalars via their JSON text, and arrays or
/// objects as compact JSON (Binance expects e.g. `symbols=["BTCUSDT"]`).
pub fn render_param(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Output of a signer: everything the transport needs for one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
    pub method: HttpMethod,
    /// Absolute URL including any query string.
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<String>,
}

impl SignedRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: BTreeMap::new(),
            body: None,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, content_type: &str, body: String) -> Self {
        self.headers
            .insert("Content-Type".to_string(), content_type.to_string());
        self.body = Some(body);
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// URL without its query string, safe to log.
    pub fn redacted_url(&self) -> &str {
        self.url.split('?').next().unwrap_or(&self.url)
    }
}
