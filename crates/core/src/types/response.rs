//! Response-side types: the uniform envelope handed back to callers and the
//! rate-limit headers observed on the way.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ExchangeError, ExchangeResult};

/// Uniform `{success, data|error, code?}` result of an exchange client call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
}

impl Envelope {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            code: None,
        }
    }

    pub fn failure(error: &ExchangeError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.to_string()),
            code: error.code(),
        }
    }
}

impl From<ExchangeResult> for Envelope {
    fn from(result: ExchangeResult) -> Self {
        match result {
            Ok(data) => Envelope::ok(data),
            Err(e) => Envelope::failure(&e),
        }
    }
}

/// Rate-limit headers seen on a response. Logged, never used to throttle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RateLimitSnapshot {
    /// Binance `x-mbx-used-weight-1m`.
    pub used_weight: Option<u32>,
    pub limit: Option<u32>,
    pub remaining: Option<u32>,
    pub reset: Option<String>,
}

impl RateLimitSnapshot {
    /// Extract from lower-cased response headers; `None` if none are present.
    pub fn from_headers(headers: &HashMap<String, String>) -> Option<Self> {
        let num = |name: &str| headers.get(name).and_then(|v| v.trim().parse::<u32>().ok());
        let snapshot = Self {
            used_weight: num("x-mbx-used-weight-1m"),
            limit: num("x-ratelimit-limit"),
            remaining: num("x-ratelimit-remaining"),
            reset: headers.get("x-ratelimit-reset").cloned(),
        };
        if snapshot == Self::default() {
            None
        } else {
            Some(snapshot)
        }
    }
}
