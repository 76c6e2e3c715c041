//! # exrelay-core
//!
//! Shared building blocks for the exrelay exchange gateway.
//!
//! This crate holds the data model that flows between the exchange clients,
//! the signers and the request executor: credentials, request intents, signed
//! requests, the uniform response envelope and the error taxonomy. It also
//! owns layered configuration loading and the tracing setup used by the
//! binary.

pub mod config;
pub mod error;
pub mod logging;
pub mod types;

pub use error::{ExchangeError, ExchangeResult};
