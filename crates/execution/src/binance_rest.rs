//! Binance spot REST client.
//!
//! Market-data GETs go out unsigned; everything else is signed with the
//! query-HMAC scheme and requires an API key plus secret. Missing
//! credentials on a private call short-circuit before any signing or
//! network work.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use exrelay_core::config::{AppConfig, BinanceConfig};
use exrelay_core::error::ExchangeError;
use exrelay_core::types::{Credentials, Envelope, Exchange, HttpMethod, Params, RequestIntent};

use crate::executor::RequestExecutor;
use crate::gateway::ExchangeClient;
use crate::retry::{Clock, Jitter, RetryPolicy};
use crate::signing::QueryHmacSigner;
use crate::transport::{HttpTransport, ReqwestTransport};

/// Path prefixes of market-data endpoints that need no signature.
pub const PUBLIC_PREFIXES: &[&str] = &[
    "/api/v3/ping",
    "/api/v3/time",
    "/api/v3/exchangeInfo",
    "/api/v3/depth",
    "/api/v3/trades",
    "/api/v3/aggTrades",
    "/api/v3/klines",
    "/api/v3/uiKlines",
    "/api/v3/avgPrice",
    "/api/v3/ticker",
];

/// Envelope error for a private call made without key and secret.
pub const MISSING_CREDENTIALS: &str = "Binance API key and secret are required for this endpoint";

/// Whether `method endpoint` is a public market-data call.
pub fn is_public_endpoint(method: HttpMethod, endpoint: &str) -> bool {
    let path = endpoint.split('?').next().unwrap_or(endpoint);
    method == HttpMethod::Get && PUBLIC_PREFIXES.iter().any(|p| path.starts_with(p))
}

/// Binance REST client.
///
/// Shares one transport (and so one connection pool) across requests.
pub struct BinanceRestClient {
    executor: RequestExecutor,
    credentials: Option<Credentials>,
}

impl BinanceRestClient {
    /// Client over `transport` with credentials taken from `cfg`.
    pub fn new(cfg: &BinanceConfig, transport: Arc<dyn HttpTransport>) -> Self {
        let signer = QueryHmacSigner::new(cfg.rest_url.clone(), cfg.recv_window)
            .with_api_key(Some(cfg.api_key.clone()));
        Self {
            executor: RequestExecutor::new(Exchange::Binance, Arc::new(signer), transport),
            credentials: cfg.credentials(),
        }
    }

    /// Production client: `reqwest` transport, configured retry policy.
    pub fn from_config(cfg: &AppConfig) -> Result<Self> {
        let transport = ReqwestTransport::new(&cfg.http)
            .context("failed to build Binance HTTP transport")?;
        Ok(Self::new(&cfg.binance, Arc::new(transport))
            .with_retry_policy(RetryPolicy::from(&cfg.retry))
            .with_debug_http(cfg.logging.debug_http))
    }

    /// Replace the configured credentials.
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
}

#[async_trait]
impl ExchangeClient for BinanceRestClient {
    fn exchange(&self) -> Exchange {
        Exchange::Binance
    }

    async fn request(
        &self,
        method: HttpMethod,
        endpoint: &str,
        params: Params,
        cancel: &CancellationToken,
    ) -> Envelope {
        let public = is_public_endpoint(method, endpoint);
        if !public && self.credentials.is_none() {
            debug!(%method, endpoint, "Binance private call without credentials");
            return Envelope::failure(&ExchangeError::Credential(MISSING_CREDENTIALS.to_string()));
        }

        debug!(%method, endpoint, public, "Binance request");
        let intent = RequestIntent::new(method, endpoint, params).public(public);
        self.executor
            .execute(&intent, self.credentials.as_ref(), cancel)
            .await
            .into()
    }
}
