//! Exchange clients end to end over scripted transports.

mod support;

use std::sync::Arc;

use serde_json::json;
use tokio_util::sync::CancellationToken;

use exrelay_core::config::{BinanceConfig, CoinbaseConfig};
use exrelay_core::types::{HttpMethod, Params};
use exrelay_execution::transport::{RawResponse, TransportError};
use exrelay_execution::{binance_rest, coinbase_rest};
use exrelay_execution::{BinanceRestClient, CoinbaseRestClient, ExchangeClient};

use support::{FixedJitter, RecordingClock, ScriptedTransport, CDP_KEY_NAME, EC_KEY_PEM};

fn binance_config(api_key: &str, api_secret: &str) -> BinanceConfig {
    BinanceConfig {
        rest_url: "https://api.binance.com".to_string(),
        api_key: api_key.to_string(),
        api_secret: api_secret.to_string(),
        recv_window: 5000,
    }
}

fn coinbase_config(with_credentials: bool) -> CoinbaseConfig {
    CoinbaseConfig {
        rest_url: "https://api.coinbase.com".to_string(),
        api_key: if with_credentials { CDP_KEY_NAME.to_string() } else { String::new() },
        private_key: if with_credentials { EC_KEY_PEM.to_string() } else { String::new() },
        public_prefixes: vec![
            "/api/v3/brokerage/market/".to_string(),
            "/api/v3/brokerage/time".to_string(),
        ],
    }
}

fn binance(cfg: &BinanceConfig, transport: Arc<ScriptedTransport>) -> BinanceRestClient {
    BinanceRestClient::new(cfg, transport)
        .with_clock(RecordingClock::new())
        .with_jitter(Arc::new(FixedJitter(1.0)))
}

fn coinbase(cfg: &CoinbaseConfig, transport: Arc<ScriptedTransport>) -> CoinbaseRestClient {
    CoinbaseRestClient::new(cfg, transport)
        .with_clock(RecordingClock::new())
        .with_jitter(Arc::new(FixedJitter(1.0)))
}

fn params(pairs: &[(&str, serde_json::Value)]) -> Params {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

// ── Binance ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_binance_public_ticker_without_credentials() {
    let transport = ScriptedTransport::statuses(&[(200, r#"{"symbol":"BTCUSDT","price":"42000.00"}"#)]);
    let client = binance(&binance_config("", ""), transport.clone());

    let envelope = client
        .get("/api/v3/ticker/price", params(&[("symbol", json!("BTCUSDT"))]))
        .await;

    assert!(envelope.success);
    assert_eq!(envelope.data, Some(json!({"symbol": "BTCUSDT", "price": "42000.00"})));
    let sent = transport.requests();
    assert_eq!(sent[0].url, "https://api.binance.com/api/v3/ticker/price?symbol=BTCUSDT");
    assert!(sent[0].headers.is_empty());
}

#[tokio::test]
async fn test_binance_private_call_without_secret_short_circuits() {
    let transport = ScriptedTransport::statuses(&[(200, "{}")]);
    let client = binance(&binance_config("key", ""), transport.clone());

    let envelope = client
        .post("/api/v3/order", params(&[("symbol", json!("BTCUSDT"))]))
        .await;

    assert!(!envelope.success);
    assert_eq!(envelope.error.as_deref(), Some(binance_rest::MISSING_CREDENTIALS));
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn test_binance_order_is_signed_form_body() {
    let transport = ScriptedTransport::statuses(&[(200, r#"{"orderId":28,"status":"NEW"}"#)]);
    let client = binance(&binance_config("key", "secret"), transport.clone());

    let envelope = client
        .post(
            "/api/v3/order",
            params(&[
                ("symbol", json!("BTCUSDT")),
                ("side", json!("BUY")),
                ("type", json!("LIMIT")),
                ("quantity", json!("0.001")),
            ]),
        )
        .await;

    assert!(envelope.success);
    let sent = &transport.requests()[0];
    assert_eq!(sent.method, HttpMethod::Post);
    assert_eq!(sent.url, "https://api.binance.com/api/v3/order");
    assert_eq!(sent.header("X-MBX-APIKEY"), Some("key"));
    assert_eq!(sent.header("Content-Type"), Some("application/x-www-form-urlencoded"));
    let body = sent.body.as_deref().unwrap();
    assert!(body.starts_with("symbol=BTCUSDT&side=BUY&type=LIMIT&quantity=0.001&timestamp="));
    assert!(body.contains("&recvWindow=5000&signature="));
}

#[tokio::test]
async fn test_binance_exhausted_rate_limit_reports_code() {
    let transport = ScriptedTransport::statuses(&[
        (429, r#"{"code":-1003,"msg":"Too much request weight used"}"#),
        (429, r#"{"code":-1003,"msg":"Too much request weight used"}"#),
        (429, r#"{"code":-1003,"msg":"Too much request weight used"}"#),
    ]);
    let client = binance(&binance_config("key", "secret"), transport.clone());

    let envelope = client.get("/api/v3/account", Params::new()).await;

    assert!(!envelope.success);
    assert_eq!(envelope.code, Some(429));
    assert_eq!(envelope.error.as_deref(), Some("Too much request weight used"));
    assert_eq!(transport.calls(), 3);
}

#[tokio::test]
async fn test_binance_transport_failure_envelope() {
    let transport = ScriptedTransport::new(vec![Err(TransportError::new("request timed out"))]);
    let client = binance(&binance_config("key", "secret"), transport.clone());

    let envelope = client.get("/api/v3/account", Params::new()).await;

    assert!(!envelope.success);
    assert_eq!(envelope.error.as_deref(), Some("connection error: request timed out"));
    assert_eq!(envelope.code, None);
}

// ── Coinbase ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_coinbase_private_call_without_credentials_short_circuits() {
    let transport = ScriptedTransport::statuses(&[(200, "{}")]);
    let client = coinbase(&coinbase_config(false), transport.clone());

    let envelope = client.get("/api/v3/brokerage/accounts", Params::new()).await;

    assert!(!envelope.success);
    assert_eq!(envelope.error.as_deref(), Some(coinbase_rest::MISSING_CREDENTIALS));
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn test_coinbase_public_product_book_without_credentials() {
    let transport = ScriptedTransport::statuses(&[(200, r#"{"pricebook":{}}"#)]);
    let client = coinbase(&coinbase_config(false), transport.clone());

    let envelope = client
        .get(
            "/api/v3/brokerage/market/product_book",
            params(&[("product_id", json!("BTC-USD"))]),
        )
        .await;

    assert!(envelope.success);
    let sent = &transport.requests()[0];
    assert_eq!(
        sent.url,
        "https://api.coinbase.com/api/v3/brokerage/market/product_book?product_id=BTC-USD"
    );
    assert_eq!(sent.header("Authorization"), None);
}

#[tokio::test]
async fn test_coinbase_order_carries_bearer_and_json_body() {
    let transport = ScriptedTransport::statuses(&[(200, r#"{"success":true}"#)]);
    let client = coinbase(&coinbase_config(true), transport.clone());

    let envelope = client
        .post(
            "/api/v3/brokerage/orders",
            params(&[
                ("client_order_id", json!("abc")),
                ("product_id", json!("BTC-USD")),
                ("side", json!("BUY")),
            ]),
        )
        .await;

    assert!(envelope.success);
    let sent = &transport.requests()[0];
    assert!(sent.header("Authorization").unwrap().starts_with("Bearer "));
    assert_eq!(sent.header("Content-Type"), Some("application/json"));
    assert_eq!(
        sent.body.as_deref(),
        Some(r#"{"client_order_id":"abc","product_id":"BTC-USD","side":"BUY"}"#)
    );
}

#[tokio::test]
async fn test_coinbase_error_message_from_errors_array() {
    let transport = ScriptedTransport::new(vec![Ok(RawResponse::new(
        404,
        r#"{"errors":[{"message":"order not found"}]}"#,
    ))]);
    let client = coinbase(&coinbase_config(true), transport.clone());

    let envelope = client
        .delete("/api/v3/brokerage/orders/historical/abc", Params::new())
        .await;

    assert!(!envelope.success);
    assert_eq!(envelope.code, Some(404));
    assert_eq!(envelope.error.as_deref(), Some("order not found"));
}

#[tokio::test]
async fn test_cancelled_request_envelope() {
    let transport = ScriptedTransport::statuses(&[(200, "{}")]);
    let client = coinbase(&coinbase_config(true), transport.clone());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let envelope = client
        .request(HttpMethod::Get, "/api/v3/brokerage/accounts", Params::new(), &cancel)
        .await;

    assert!(!envelope.success);
    assert_eq!(envelope.error.as_deref(), Some("request cancelled"));
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn test_envelope_serializes_without_absent_fields() {
    let transport = ScriptedTransport::statuses(&[(204, "")]);
    let client = coinbase(&coinbase_config(true), transport);

    let envelope = client
        .delete("/api/v3/brokerage/portfolios/abc", Params::new())
        .await;

    assert_eq!(
        serde_json::to_value(&envelope).unwrap(),
        json!({"success": true, "data": {}})
    );
}
