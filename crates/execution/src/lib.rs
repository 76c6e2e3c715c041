//! # exrelay-execution
//!
//! Authenticated, retried request execution against the Binance and
//! Coinbase REST APIs. Signs each attempt (query-HMAC or ES256 bearer JWT),
//! sends it over a pluggable transport, classifies the response and drives
//! a bounded backoff loop. Exchange clients wrap the outcome in an
//! [`Envelope`](exrelay_core::types::Envelope).

pub mod binance_rest;
pub mod classify;
pub mod coinbase_rest;
pub mod executor;
pub mod gateway;
pub mod retry;
pub mod signing;
pub mod transport;

pub use binance_rest::BinanceRestClient;
pub use coinbase_rest::CoinbaseRestClient;
pub use executor::RequestExecutor;
pub use gateway::ExchangeClient;
