//! Unified exchange client trait.
//!
//! The [`ExchangeClient`] trait gives callers one way to issue a call against
//! either exchange. Implementors decide whether an endpoint is public, check
//! credentials, and hand the intent to the shared
//! [`RequestExecutor`](crate::executor::RequestExecutor). The result is
//! always an [`Envelope`]; nothing is thrown past this boundary.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use exrelay_core::types::{Envelope, Exchange, HttpMethod, Params};

#[async_trait]
pub trait ExchangeClient: Send + Sync {
    /// Which exchange this client talks to.
    fn exchange(&self) -> Exchange;

    /// Issue one logical request and wrap the outcome.
    async fn request(
        &self,
        method: HttpMethod,
        endpoint: &str,
        params: Params,
        cancel: &CancellationToken,
    ) -> Envelope;

    async fn get(&self, endpoint: &str, params: Params) -> Envelope {
        self.request(HttpMethod::Get, endpoint, params, &CancellationToken::new())
            .await
    }

    async fn post(&self, endpoint: &str, params: Params) -> Envelope {
        self.request(HttpMethod::Post, endpoint, params, &CancellationToken::new())
            .await
    }

    async fn delete(&self, endpoint: &str, params: Params) -> Envelope {
        self.request(HttpMethod::Delete, endpoint, params, &CancellationToken::new())
            .await
    }
}
