//! HMAC-SHA256 query-string signing for the Binance REST API.
//!
//! Uses the `ring` crate for constant-time HMAC computation, avoiding
//! OpenSSL dependencies. Secrets are never logged or included in error messages.

use chrono::{DateTime, Utc};
use ring::hmac;

use exrelay_core::error::ExchangeError;
use exrelay_core::types::{Credentials, HmacCredentials, RequestIntent, SignedRequest};

use super::{encode_pairs, join_url, merge_pairs, split_endpoint, RequestSigner};

/// Header carrying the Binance API key.
pub const API_KEY_HEADER: &str = "X-MBX-APIKEY";

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Sign a Binance query string: hex-encoded `HMAC-SHA256(secret, query)`.
pub fn sign_query(secret: &str, query: &str) -> String {
    let key = hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes());
    let signature = hmac::sign(&key, query.as_bytes());
    hex::encode(signature.as_ref())
}

/// Signer for the query-HMAC scheme.
///
/// Signed calls get `timestamp` (and `recvWindow` for state-changing calls)
/// appended, then `signature` over the URL-encoded parameters in their given
/// order. Reads travel in the query string; writes travel as a form body.
/// The API key header is attached whenever a key is known, even on
/// unsigned public calls.
#[derive(Debug, Clone)]
pub struct QueryHmacSigner {
    base_url: String,
    recv_window: u64,
    /// Key sent on public calls when only a key (no secret) is configured.
    api_key: Option<String>,
}

impl QueryHmacSigner {
    pub fn new(base_url: impl Into<String>, recv_window: u64) -> Self {
        Self {
            base_url: base_url.into(),
            recv_window,
            api_key: None,
        }
    }

    /// Send `api_key` on calls made without full credentials.
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|k| !k.trim().is_empty());
        self
    }

    pub fn recv_window(&self) -> u64 {
        self.recv_window
    }

    fn signed_pairs(
        &self,
        pairs: Vec<(String, String)>,
        intent: &RequestIntent,
        creds: &HmacCredentials,
        now: DateTime<Utc>,
    ) -> Result<String, ExchangeError> {
        let mut pairs: Vec<(String, String)> = pairs
            .into_iter()
            .filter(|(k, _)| k != "timestamp" && k != "signature")
            .collect();

        pairs.push(("timestamp".to_string(), now.timestamp_millis().to_string()));
        if !intent.method.is_read() && !pairs.iter().any(|(k, _)| k == "recvWindow") {
            pairs.push(("recvWindow".to_string(), self.recv_window.to_string()));
        }

        let query = encode_pairs(&pairs)?;
        let signature = sign_query(&creds.secret_key, &query);
        Ok(format!("{query}&signature={signature}"))
    }
}

impl RequestSigner for QueryHmacSigner {
    fn sign(
        &self,
        intent: &RequestIntent,
        credentials: Option<&Credentials>,
        now: DateTime<Utc>,
    ) -> Result<SignedRequest, ExchangeError> {
        let creds = match credentials {
            Some(Credentials::Hmac(c)) => Some(c),
            Some(Credentials::Jwt(_)) => {
                return Err(ExchangeError::Credential(
                    "query-HMAC signing needs an API key and secret, not a private key".to_string(),
                ))
            }
            None => None,
        };

        let (path, embedded) = split_endpoint(&intent.endpoint)?;
        let pairs = merge_pairs(embedded, intent);
        let payload = match creds {
            Some(c) if !intent.is_public => self.signed_pairs(pairs, intent, c, now)?,
            _ => encode_pairs(&pairs)?,
        };

        let url = join_url(&self.base_url, path);
        let mut request = if intent.method.is_read() {
            if payload.is_empty() {
                SignedRequest::new(intent.method, url)
            } else {
                SignedRequest::new(intent.method, format!("{url}?{payload}"))
            }
        } else if payload.is_empty() {
            SignedRequest::new(intent.method, url)
        } else {
            SignedRequest::new(intent.method, url).with_body(FORM_CONTENT_TYPE, payload)
        };

        let api_key = creds.map(|c| c.api_key.as_str()).or(self.api_key.as_deref());
        if let Some(key) = api_key {
            request = request.with_header(API_KEY_HEADER, key);
        }

        Ok(request)
    }
}
