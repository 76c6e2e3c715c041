//! Request signing for the two exchange authentication schemes.
//!
//! Both schemes sit behind one capability, [`RequestSigner`]: take a
//! [`RequestIntent`] plus optional [`Credentials`] and produce a
//! [`SignedRequest`]. The executor calls it once per attempt, so timestamps,
//! JWT nonces and expiry windows are always fresh.
//!
//! - [`QueryHmacSigner`]: Binance, HMAC-SHA256 over the query string.
//! - [`BearerJwtSigner`]: Coinbase, ES256 JWT in an `Authorization` header.

pub mod der;
pub mod hmac;
pub mod jwt;
mod pem;

use chrono::{DateTime, Utc};

use exrelay_core::error::ExchangeError;
use exrelay_core::types::{Credentials, RequestIntent, SignedRequest};

pub use der::der_to_jose;
pub use hmac::{sign_query, QueryHmacSigner};
pub use jwt::{BearerJwtSigner, JWT_TTL_SECS};

/// Turns an unsigned intent into a request ready for the transport.
pub trait RequestSigner: Send + Sync {
    /// Sign `intent` as of `now`.
    ///
    /// Returns [`ExchangeError::Credential`] when the credentials are of the
    /// wrong kind (or missing where the scheme cannot proceed without them)
    /// and [`ExchangeError::Signing`] when key material or a signature is
    /// malformed. Neither is retried.
    fn sign(
        &self,
        intent: &RequestIntent,
        credentials: Option<&Credentials>,
        now: DateTime<Utc>,
    ) -> Result<SignedRequest, ExchangeError>;
}

/// Failure while producing a signature.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SigningError {
    #[error("malformed DER at byte {offset}: {reason}")]
    MalformedDer { reason: &'static str, offset: usize },
    #[error("unexpected DER tag 0x{found:02x} at byte {offset}, expected 0x{expected:02x}")]
    UnexpectedTag { expected: u8, found: u8, offset: usize },
    #[error("signature integer is {len} bytes, limit is {max}")]
    IntegerTooLong { len: usize, max: usize },
    #[error("unsupported PEM block: {0}")]
    UnsupportedPem(String),
    #[error("invalid private key: {0}")]
    InvalidKey(String),
    #[error("crypto failure: {0}")]
    Crypto(String),
    #[error("failed to encode request: {0}")]
    Encoding(String),
}

impl From<SigningError> for ExchangeError {
    fn from(e: SigningError) -> Self {
        ExchangeError::Signing(e.to_string())
    }
}

/// Join a base URL and an endpoint path with exactly one slash.
pub(crate) fn join_url(base_url: &str, endpoint: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        endpoint.trim_start_matches('/')
    )
}

/// Split an endpoint into its path and the pairs of any query embedded
/// after `?`.
pub(crate) fn split_endpoint(endpoint: &str) -> Result<(&str, Vec<(String, String)>), SigningError> {
    match endpoint.split_once('?') {
        Some((path, query)) => {
            let pairs = serde_urlencoded::from_str(query)
                .map_err(|e| SigningError::Encoding(format!("endpoint query: {e}")))?;
            Ok((path, pairs))
        }
        None => Ok((endpoint, Vec::new())),
    }
}

/// Endpoint-embedded pairs followed by the intent's params. A key present in
/// both keeps the params value.
pub(crate) fn merge_pairs(
    embedded: Vec<(String, String)>,
    intent: &RequestIntent,
) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = embedded
        .into_iter()
        .filter(|(k, _)| !intent.params.contains_key(k))
        .collect();
    pairs.extend(intent.query_pairs());
    pairs
}

/// URL-encode ordered pairs into `k=v&k=v`.
pub(crate) fn encode_pairs(pairs: &[(String, String)]) -> Result<String, SigningError> {
    serde_urlencoded::to_string(pairs).map_err(|e| SigningError::Encoding(e.to_string()))
}
