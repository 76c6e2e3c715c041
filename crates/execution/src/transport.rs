//! HTTP transport seam.
//!
//! The executor only sees [`HttpTransport`]; production uses
//! [`ReqwestTransport`], a single pooled `reqwest::Client` built from
//! [`HttpConfig`]. Tests substitute scripted transports.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Certificate, Client, Method};

use exrelay_core::config::HttpConfig;
use exrelay_core::types::{HttpMethod, SignedRequest};

/// Status, lower-cased headers and body text of one HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    /// Add a header; the name is stored lower-cased.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// No response was obtained: connect, timeout, TLS or DNS failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct TransportError {
    pub message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Sends one signed request and returns whatever the server answered.
///
/// Any HTTP status counts as a response; only failures to obtain one are
/// errors.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: &SignedRequest) -> Result<RawResponse, TransportError>;
}

/// `reqwest`-backed transport with a per-attempt timeout.
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Build the pooled client from HTTP settings.
    ///
    /// Fails if the CA bundle cannot be read or parsed.
    pub fn new(cfg: &HttpConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .danger_accept_invalid_certs(!cfg.tls_verify);

        if let Some(path) = &cfg.ca_bundle_path {
            let pem = std::fs::read(path)
                .with_context(|| format!("failed to read CA bundle {}", path.display()))?;
            let certs = Certificate::from_pem_bundle(&pem)
                .with_context(|| format!("failed to parse CA bundle {}", path.display()))?;
            for cert in certs {
                builder = builder.add_root_certificate(cert);
            }
        }

        let client = builder.build().context("failed to build HTTP client")?;
        Ok(Self { client })
    }
}

fn reqwest_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Delete => Method::DELETE,
    }
}

fn describe(err: reqwest::Error) -> String {
    // The URL may carry a signature; never include it.
    let err = err.without_url();
    if err.is_timeout() {
        format!("request timed out: {err}")
    } else if err.is_connect() {
        format!("failed to connect: {err}")
    } else {
        err.to_string()
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: &SignedRequest) -> Result<RawResponse, TransportError> {
        let mut builder = self
            .client
            .request(reqwest_method(request.method), &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let resp = builder
            .send()
            .await
            .map_err(|e| TransportError::new(describe(e)))?;

        let status = resp.status().as_u16();
        let headers = resp
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = resp
            .text()
            .await
            .map_err(|e| TransportError::new(describe(e)))?;

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}
