//! Failure taxonomy for a single logical exchange request.
//!
//! Every failure a request can end in maps to exactly one [`ExchangeError`]
//! variant. Exchange clients convert the final [`ExchangeResult`] into an
//! [`Envelope`](crate::types::Envelope) so nothing escapes past that boundary.

use serde_json::Value;

/// Outcome of one logical request: the decoded JSON body, or why it failed.
pub type ExchangeResult = Result<Value, ExchangeError>;

/// Terminal failure of a logical request.
///
/// Retried conditions (429, 5xx) only show up here once the attempt budget
/// is exhausted, as [`ExchangeError::Api`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExchangeError {
    /// Required key, secret or private key is absent.
    #[error("{0}")]
    Credential(String),
    /// The private key or a produced signature could not be used.
    #[error("signing failed: {0}")]
    Signing(String),
    /// Connect, timeout, TLS or DNS failure. Never retried.
    #[error("connection error: {message}")]
    Transport { message: String },
    /// The exchange answered with an HTTP error status.
    #[error("{message}")]
    Api { message: String, code: u16 },
    /// A success status carried a body that is not JSON.
    #[error("invalid JSON response: {raw}")]
    InvalidResponse { raw: String },
    /// The caller's cancellation token fired before the request finished.
    #[error("request cancelled")]
    Cancelled,
}

impl ExchangeError {
    /// HTTP status reported to the caller, present only for API errors.
    pub fn code(&self) -> Option<u16> {
        match self {
            ExchangeError::Api { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Short machine-friendly label used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            ExchangeError::Credential(_) => "credential",
            ExchangeError::Signing(_) => "signing",
            ExchangeError::Transport { .. } => "transport",
            ExchangeError::Api { code: 429, .. } => "rate_limited",
            ExchangeError::Api { code, .. } if *code >= 500 => "server",
            ExchangeError::Api { .. } => "client",
            ExchangeError::InvalidResponse { .. } => "invalid_response",
            ExchangeError::Cancelled => "cancelled",
        }
    }
}
