//! Coinbase Advanced Trade REST client.
//!
//! Private calls carry a fresh ES256 bearer JWT per attempt. Paths under a
//! configured public prefix (market data, server time) are sent unsigned.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use exrelay_core::config::{AppConfig, CoinbaseConfig};
use exrelay_core::error::ExchangeError;
use exrelay_core::types::{Credentials, Envelope, Exchange, HttpMethod, Params, RequestIntent};

use crate::executor::RequestExecutor;
use crate::gateway::ExchangeClient;
use crate::retry::{Clock, Jitter, RetryPolicy};
use crate::signing::BearerJwtSigner;
use crate::transport::{HttpTransport, ReqwestTransport};

/// Envelope error for a private call made without key name and private key.
pub const MISSING_CREDENTIALS: &str =
    "Coinbase API key and private key are required for this endpoint";

pub struct CoinbaseRestClient {
    signer: Arc<BearerJwtSigner>,
    executor: RequestExecutor,
    credentials: Option<Credentials>,
}

impl CoinbaseRestClient {
    /// Client over `transport` with credentials taken from `cfg`.
    pub fn new(cfg: &CoinbaseConfig, transport: Arc<dyn HttpTransport>) -> Self {
        let signer = Arc::new(BearerJwtSigner::new(
            cfg.rest_url.clone(),
            cfg.public_prefixes.clone(),
        ));
        Self {
            executor: RequestExecutor::new(Exchange::Coinbase, signer.clone(), transport),
            signer,
            credentials: cfg.credentials(),
        }
    }

    /// Production client: `reqwest` transport, configured retry policy.
    pub fn from_config(cfg: &AppConfig) -> Result<Self> {
        let transport = ReqwestTransport::new(&cfg.http)
            .context("failed to build Coinbase HTTP transport")?;
        Ok(Self::new(&cfg.coinbase, Arc::new(transport))
            .with_retry_policy(RetryPolicy::from(&cfg.retry))
            .with_debug_http(cfg.logging.debug_http))
    }

    pub fn with_credentials(mut self, credentials: Option<Credentials>) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.executor = self.executor.with_policy(policy);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.executor = self.executor.with_clock(clock);
        self
    }

    pub fn with_jitter(mut self, jitter: Arc<dyn Jitter>) -> Self {
        self.executor = self.executor.with_jitter(jitter);
        self
    }

    pub fn with_debug_http(mut self, enabled: bool) -> Self {
        self.executor = self.executor.with_debug_http(enabled);
        self
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }

    /// Whether `endpoint` falls under a public prefix.
    pub fn is_public_endpoint(&self, endpoint: &str) -> bool {
        self.signer.is_public_path(endpoint)
    }
}

#[async_trait]
impl ExchangeClient for CoinbaseRestClient {
    fn exchange(&self) -> Exchange {
        Exchange::Coinbase
    }

    async fn request(
        &self,
        method: HttpMethod,
        endpoint: &str,
        params: Params,
        cancel: &CancellationToken,
    ) -> Envelope {
        let public = self.is_public_endpoint(endpoint);
        if !public && self.credentials.is_none() {
            debug!(%method, endpoint, "Coinbase private call without credentials");
            return Envelope::failure(&ExchangeError::Credential(MISSING_CREDENTIALS.to_string()));
        }

        debug!(%method, endpoint, public, "Coinbase request");
        let intent = RequestIntent::new(method, endpoint, params).public(public);
        self.executor
            .execute(&intent, self.credentials.as_ref(), cancel)
            .await
            .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use exrelay_core::types::SignedRequest;

    use crate::transport::{RawResponse, TransportError};

    #[derive(Default)]
    struct Capture(Mutex<Vec<SignedRequest>>);

    #[async_trait]
    impl HttpTransport for Capture {
        async fn send(&self, request: &SignedRequest) -> Result<RawResponse, TransportError> {
            self.0.lock().unwrap().push(request.clone());
            Ok(RawResponse::new(200, r#"{"iso":"2024-01-01T00:00:00Z"}"#))
        }
    }

    fn config() -> CoinbaseConfig {
        CoinbaseConfig {
            rest_url: "https://api.coinbase.com".to_string(),
            api_key: String::new(),
            private_key: String::new(),
            public_prefixes: vec![
                "/api/v3/brokerage/market/".to_string(),
                "/api/v3/brokerage/time".to_string(),
            ],
        }
    }

    #[test]
    fn test_public_prefixes() {
        let client = CoinbaseRestClient::new(&config(), Arc::new(Capture::default()));
        assert!(client.is_public_endpoint("/api/v3/brokerage/time"));
        assert!(client.is_public_endpoint("/api/v3/brokerage/market/products"));
        assert!(!client.is_public_endpoint("/api/v3/brokerage/accounts"));
        assert!(!client.is_public_endpoint("/api/v3/brokerage/orders"));
    }

    #[tokio::test]
    async fn test_missing_credentials_short_circuit() {
        let transport = Arc::new(Capture::default());
        let client = CoinbaseRestClient::new(&config(), transport.clone());

        let envelope = client.get("/api/v3/brokerage/accounts", Params::new()).await;
        assert!(!envelope.success);
        assert_eq!(envelope.error.as_deref(), Some(MISSING_CREDENTIALS));
        assert!(transport.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_public_call_is_unsigned() {
        let transport = Arc::new(Capture::default());
        let client = CoinbaseRestClient::new(&config(), transport.clone());

        let envelope = client.get("/api/v3/brokerage/time", Params::new()).await;
        assert!(envelope.success);
        assert_eq!(
            envelope.data,
            Some(serde_json::json!({"iso": "2024-01-01T00:00:00Z"}))
        );

        let sent = transport.0.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].url, "https://api.coinbase.com/api/v3/brokerage/time");
        assert_eq!(sent[0].header("Authorization"), None);
    }
}
