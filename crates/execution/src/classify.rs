//! Maps a raw HTTP response to success, a retryable failure or a terminal
//! failure.

use serde_json::Value;

use exrelay_core::error::ExchangeError;

use crate::transport::RawResponse;

/// What the executor should do with a response.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    /// Decoded JSON body; an empty body decodes to `{}`.
    Success(Value),
    /// HTTP 429 or 5xx. Retried while budget remains, otherwise surfaced
    /// as the carried error.
    Retryable(ExchangeError),
    /// Any other failure. Returned immediately.
    Terminal(ExchangeError),
}

/// Whether `status` is worth another attempt.
pub fn is_retryable_status(status: u16) -> bool {
    status == 429 || (500..=599).contains(&status)
}

pub fn classify(response: &RawResponse) -> Classification {
    let status = response.status;

    if status >= 400 {
        let error = ExchangeError::Api {
            message: error_message(status, &response.body),
            code: status,
        };
        return if is_retryable_status(status) {
            Classification::Retryable(error)
        } else {
            Classification::Terminal(error)
        };
    }

    if response.body.trim().is_empty() {
        return Classification::Success(Value::Object(Default::default()));
    }

    match serde_json::from_str::<Value>(&response.body) {
        Ok(body) => Classification::Success(body),
        Err(_) => Classification::Terminal(ExchangeError::InvalidResponse {
            raw: response.body.clone(),
        }),
    }
}

/// Human-readable message from an error body.
///
/// Looks at `message`, `msg` (Binance), `error` and `errors[0].message` in
/// that order and falls back to `HTTP {status}`.
pub fn error_message(status: u16, body: &str) -> String {
    let fallback = || format!("HTTP {status}");
    let Ok(json) = serde_json::from_str::<Value>(body) else {
        return fallback();
    };

    let non_empty = |v: Option<&Value>| {
        v.and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string)
    };

    non_empty(json.get("message"))
        .or_else(|| non_empty(json.get("msg")))
        .or_else(|| non_empty(json.get("error")))
        .or_else(|| non_empty(json.pointer("/errors/0/message")))
        .unwrap_or_else(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn response(status: u16, body: &str) -> RawResponse {
        RawResponse {
            status,
            headers: HashMap::new(),
            body: body.to_string(),
        }
    }

    #[test]
    fn test_success_body_decoded() {
        assert_eq!(
            classify(&response(200, r#"{"serverTime":1499827319559}"#)),
            Classification::Success(json!({"serverTime": 1499827319559u64}))
        );
        assert_eq!(
            classify(&response(200, r#"[{"symbol":"BTCUSDT"}]"#)),
            Classification::Success(json!([{"symbol": "BTCUSDT"}]))
        );
    }

    #[test]
    fn test_empty_body_is_empty_object() {
        assert_eq!(classify(&response(200, "")), Classification::Success(json!({})));
        assert_eq!(classify(&response(204, "  \n")), Classification::Success(json!({})));
    }

    #[test]
    fn test_non_json_success_is_invalid_response() {
        assert_eq!(
            classify(&response(200, "<html>maintenance</html>")),
            Classification::Terminal(ExchangeError::InvalidResponse {
                raw: "<html>maintenance</html>".to_string()
            })
        );
    }

    #[test]
    fn test_rate_limit_and_server_errors_retryable() {
        for status in [429u16, 500, 502, 503, 599] {
            assert!(
                matches!(
                    classify(&response(status, "")),
                    Classification::Retryable(ExchangeError::Api { code, .. }) if code == status
                ),
                "status {status}"
            );
        }
    }

    #[test]
    fn test_client_errors_terminal() {
        for status in [400u16, 401, 403, 404, 418] {
            assert!(
                matches!(
                    classify(&response(status, "")),
                    Classification::Terminal(ExchangeError::Api { code, .. }) if code == status
                ),
                "status {status}"
            );
        }
    }

    #[test]
    fn test_error_message_precedence() {
        assert_eq!(
            error_message(400, r#"{"message":"m","error":"e"}"#),
            "m"
        );
        assert_eq!(
            error_message(400, r#"{"code":-1121,"msg":"Invalid symbol."}"#),
            "Invalid symbol."
        );
        assert_eq!(error_message(401, r#"{"error":"unauthorized"}"#), "unauthorized");
        assert_eq!(
            error_message(400, r#"{"errors":[{"message":"bad size"},{"message":"x"}]}"#),
            "bad size"
        );
    }

    #[test]
    fn test_error_message_fallbacks() {
        assert_eq!(error_message(503, ""), "HTTP 503");
        assert_eq!(error_message(502, "<html>Bad Gateway</html>"), "HTTP 502");
        assert_eq!(error_message(400, r#"{"error":{"code":1}}"#), "HTTP 400");
        assert_eq!(error_message(400, r#"{"message":""}"#), "HTTP 400");
    }
}
