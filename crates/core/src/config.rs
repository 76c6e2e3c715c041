//! Layered configuration for the exrelay gateway.
//!
//! Configuration is loaded in layers with increasing priority:
//! 1. Compiled-in defaults (production base URLs, conservative retry policy)
//! 2. TOML configuration file (if provided)
//! 3. Environment variable overrides (prefix `EXRELAY_`, nested with `__`)
//! 4. Specific env vars for credentials (`BINANCE_API_KEY`, etc.)
//!
//! API keys, secrets and private keys **must** come from environment
//! variables, never from configuration files, to prevent accidental check-in
//! of credentials.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::types::Credentials;

// ── Default value functions ────────────────────────────────────────────

/// Default per-attempt request timeout: 10 000 ms.
fn default_timeout_ms() -> u64 {
    10_000
}

fn default_tls_verify() -> bool {
    true
}

/// Default Binance `recvWindow`: 5 000 ms.
fn default_recv_window() -> u64 {
    5_000
}

/// Default base retry delay: 200 ms, doubled per attempt.
fn default_retry_delay_ms() -> u64 {
    200
}

/// Default backoff ceiling: 2 000 ms.
fn default_max_backoff_ms() -> u64 {
    2_000
}

/// Upper bound accepted for `retry.max_backoff_ms`: one hour.
pub const MAX_BACKOFF_LIMIT_MS: u64 = 3_600_000;

/// Default retry budget: 2 retries, i.e. at most 3 attempts.
fn default_max_retries() -> u32 {
    2
}

fn default_coinbase_public_prefixes() -> Vec<String> {
    vec![
        "/api/v3/brokerage/market/".to_string(),
        "/api/v3/brokerage/time".to_string(),
    ]
}

// ── Configuration structs ──────────────────────────────────────────────

/// Top-level application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Binance (query-HMAC) connection settings.
    pub binance: BinanceConfig,
    /// Coinbase Advanced Trade (JWT) connection settings.
    pub coinbase: CoinbaseConfig,
    /// Transport settings shared by both exchanges.
    pub http: HttpConfig,
    /// Retry/backoff policy.
    pub retry: RetryConfig,
    /// Log output settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Binance connection configuration.
///
/// `api_key` and `api_secret` are loaded from env vars only. Blank values
/// mean "not configured": public endpoints still work.
#[derive(Debug, Clone, Deserialize)]
pub struct BinanceConfig {
    /// REST API base URL.
    pub rest_url: String,
    /// API key, loaded from `BINANCE_API_KEY`.
    #[serde(default)]
    pub api_key: String,
    /// HMAC secret, loaded from `BINANCE_API_SECRET`.
    #[serde(default)]
    pub api_secret: String,
    /// Timestamp tolerance sent with state-changing calls, in milliseconds.
    #[serde(default = "default_recv_window")]
    pub recv_window: u64,
}

/// Coinbase Advanced Trade connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CoinbaseConfig {
    /// REST API base URL. Its host goes into the JWT `uri` claim.
    pub rest_url: String,
    /// CDP key name, loaded from `COINBASE_API_KEY`.
    #[serde(default)]
    pub api_key: String,
    /// PEM-encoded EC private key, loaded from `COINBASE_PRIVATE_KEY`.
    #[serde(default)]
    pub private_key: String,
    /// Path prefixes that bypass signing.
    #[serde(default = "default_coinbase_public_prefixes")]
    pub public_prefixes: Vec<String>,
}

/// Transport configuration. Fixed for the lifetime of a client.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Timeout for a single attempt, in milliseconds. Not cumulative across retries.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Verify the server's TLS certificate.
    #[serde(default = "default_tls_verify")]
    pub tls_verify: bool,
    /// Extra PEM CA bundle trusted in addition to the built-in roots.
    #[serde(default)]
    pub ca_bundle_path: Option<PathBuf>,
}

/// Retry/backoff configuration for HTTP 429 and 5xx responses.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Base delay before the first retry, in milliseconds.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Ceiling applied to the pre-jitter delay, in milliseconds.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    /// Retries after the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

/// Log output configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    /// Emit JSON lines instead of pretty output.
    #[serde(default)]
    pub json: bool,
    /// Log a request/response summary for every attempt.
    #[serde(default)]
    pub debug_http: bool,
}

impl BinanceConfig {
    /// HMAC credentials, if both key and secret are configured.
    pub fn credentials(&self) -> Option<Credentials> {
        Credentials::hmac(self.api_key.clone(), self.api_secret.clone())
    }
}

impl CoinbaseConfig {
    /// JWT credentials, if both key name and private key are configured.
    pub fn credentials(&self) -> Option<Credentials> {
        Credentials::jwt(self.api_key.clone(), self.private_key.clone())
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            tls_verify: default_tls_verify(),
            ca_bundle_path: None,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            retry_delay_ms: default_retry_delay_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            max_retries: default_max_retries(),
        }
    }
}

impl AppConfig {
    /// Load configuration using layered sources.
    ///
    /// 1. Compiled-in defaults (production base URLs, 10 s timeout, 2 retries).
    /// 2. TOML file at `config_path` (if `Some`).
    /// 3. Environment variable overrides with prefix `EXRELAY_` and `__` as
    ///    the nesting separator (e.g., `EXRELAY_RETRY__MAX_RETRIES=4`).
    /// 4. Credentials from dedicated env vars: `BINANCE_API_KEY`,
    ///    `BINANCE_API_SECRET`, `COINBASE_API_KEY`, `COINBASE_PRIVATE_KEY`.
    pub fn load(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = Config::builder()
            // ── Layer 1: compiled-in defaults ───────────────────────
            .set_default("binance.rest_url", "https://api.binance.com")?
            .set_default("binance.recv_window", 5000i64)?
            .set_default("binance.api_key", "")?
            .set_default("binance.api_secret", "")?
            .set_default("coinbase.rest_url", "https://api.coinbase.com")?
            .set_default("coinbase.api_key", "")?
            .set_default("coinbase.private_key", "")?
            .set_default("coinbase.public_prefixes", default_coinbase_public_prefixes())?
            .set_default("http.timeout_ms", 10000i64)?
            .set_default("http.tls_verify", true)?
            .set_default("retry.retry_delay_ms", 200i64)?
            .set_default("retry.max_backoff_ms", 2000i64)?
            .set_default("retry.max_retries", 2i64)?
            .set_default("logging.json", false)?
            .set_default("logging.debug_http", false)?;

        // ── Layer 2: TOML file ─────────────────────────────────────
        if let Some(path) = config_path {
            let path_str = path
                .to_str()
                .context("config path is not valid UTF-8")?;
            builder = builder.add_source(File::with_name(path_str).required(true));
        }

        // ── Layer 3: env var overrides (EXRELAY_ prefix) ──────────
        // The prefix separator is set to `_` explicitly; otherwise the
        // `config` crate reuses the `__` nesting separator for the prefix.
        builder = builder.add_source(
            Environment::with_prefix("EXRELAY")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let mut cfg: AppConfig = builder
            .build()
            .context("failed to build configuration")?
            .try_deserialize()
            .context("failed to deserialize configuration")?;

        // ── Layer 4: dedicated credential env vars ─────────────────
        if let Ok(v) = std::env::var("BINANCE_API_KEY") {
            cfg.binance.api_key = v;
        }
        if let Ok(v) = std::env::var("BINANCE_API_SECRET") {
            cfg.binance.api_secret = v;
        }
        if let Ok(v) = std::env::var("COINBASE_API_KEY") {
            cfg.coinbase.api_key = v;
        }
        if let Ok(v) = std::env::var("COINBASE_PRIVATE_KEY") {
            cfg.coinbase.private_key = v;
        }

        // ── Validation ─────────────────────────────────────────────
        cfg.validate()?;

        Ok(cfg)
    }

    /// Validate configuration invariants.
    fn validate(&self) -> Result<()> {
        for (name, url) in [
            ("binance", &self.binance.rest_url),
            ("coinbase", &self.coinbase.rest_url),
        ] {
            if !(url.starts_with("https://") || url.starts_with("http://")) {
                bail!("{name}.rest_url must be an http(s) URL, got {url:?}");
            }
        }
        if self.http.timeout_ms == 0 {
            bail!("http.timeout_ms must be greater than zero");
        }
        if let Some(path) = &self.http.ca_bundle_path {
            if !path.exists() {
                bail!("http.ca_bundle_path {} does not exist", path.display());
            }
        }
        if self.retry.max_backoff_ms < self.retry.retry_delay_ms {
            bail!(
                "retry.max_backoff_ms ({}) must not be below retry.retry_delay_ms ({})",
                self.retry.max_backoff_ms,
                self.retry.retry_delay_ms
            );
        }
        if self.retry.max_backoff_ms > MAX_BACKOFF_LIMIT_MS {
            bail!(
                "retry.max_backoff_ms ({}) must not exceed {MAX_BACKOFF_LIMIT_MS}",
                self.retry.max_backoff_ms
            );
        }
        Ok(())
    }
}
