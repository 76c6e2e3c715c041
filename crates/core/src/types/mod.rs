//! Data model shared by the exchange clients, signers and executor.

pub mod credentials;
pub mod exchange;
pub mod request;
pub mod response;

// Re-export primary types for convenient access via `exrelay_core::types::*`.
pub use credentials::{Credentials, HmacCredentials, JwtCredentials};
pub use exchange::{Exchange, HttpMethod};
pub use request::{render_param, Params, RequestIntent, SignedRequest};
pub use response::{Envelope, RateLimitSnapshot};
