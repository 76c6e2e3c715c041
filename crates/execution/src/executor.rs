//! The attempt loop shared by both exchange clients.
//!
//! ```text
//! ATTEMPT(i) ──sign──▶ send ──▶ classify
//!    ▲                  │          ├── Success        ─▶ Ok(body)
//!    │                  │          ├── Terminal       ─▶ Err(e)
//!    │                  │          └── Retryable, i < max_retries
//!    │                  │                   │
//!    └──── BACKOFF ◀────┼───────────────────┘
//!                       └── transport failure ─▶ Err(Transport), no retry
//! ```
//!
//! Every attempt re-signs the intent, so timestamps and JWT nonces are never
//! reused. Cancellation aborts both the in-flight call and a pending backoff.

use std::sync::Arc;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use exrelay_core::error::{ExchangeError, ExchangeResult};
use exrelay_core::types::{Credentials, Exchange, RateLimitSnapshot, RequestIntent};

use crate::classify::{classify, Classification};
use crate::retry::{parse_retry_after, Clock, Jitter, RandomJitter, RetryPolicy, SystemClock};
use crate::signing::RequestSigner;
use crate::transport::HttpTransport;

/// Per-call bookkeeping. Lives for one logical request only.
#[derive(Debug, Clone, Copy)]
struct AttemptState {
    /// 0-based; never exceeds `max_retries`.
    index: u32,
    started: Instant,
}

impl AttemptState {
    fn first() -> Self {
        Self {
            index: 0,
            started: Instant::now(),
        }
    }

    fn next(self) -> Self {
        Self {
            index: self.index + 1,
            started: Instant::now(),
        }
    }
}

/// Signs, sends, classifies and retries one logical request.
///
/// Holds no per-request mutable state, so one executor can serve any number
/// of concurrent calls.
pub struct RequestExecutor {
    exchange: Exchange,
    signer: Arc<dyn RequestSigner>,
    transport: Arc<dyn HttpTransport>,
    policy: RetryPolicy,
    clock: Arc<dyn Clock>,
    jitter: Arc<dyn Jitter>,
    debug_http: bool,
}

impl RequestExecutor {
    /// Executor with the default retry policy, real time and random jitter.
    pub fn new(
        exchange: Exchange,
        signer: Arc<dyn RequestSigner>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            exchange,
            signer,
            transport,
            policy: RetryPolicy::default(),
            clock: Arc::new(SystemClock),
            jitter: Arc::new(RandomJitter),
            debug_http: false,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_jitter(mut self, jitter: Arc<dyn Jitter>) -> Self {
        self.jitter = jitter;
        self
    }

    /// Emit one `info` summary per attempt.
    pub fn with_debug_http(mut self, enabled: bool) -> Self {
        self.debug_http = enabled;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run the attempt loop for `intent`.
    ///
    /// At most `max_retries + 1` transport calls are made. Signing errors
    /// and transport failures end the loop immediately.
    pub async fn execute(
        &self,
        intent: &RequestIntent,
        credentials: Option<&Credentials>,
        cancel: &CancellationToken,
    ) -> ExchangeResult {
        let mut attempt = AttemptState::first();

        loop {
            if cancel.is_cancelled() {
                return Err(ExchangeError::Cancelled);
            }

            let request = self.signer.sign(intent, credentials, self.clock.now())?;

            let sent = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ExchangeError::Cancelled),
                sent = self.transport.send(&request) => sent,
            };

            let response = match sent {
                Ok(response) => response,
                Err(e) => {
                    warn!(
                        exchange = %self.exchange,
                        method = %request.method,
                        url = request.redacted_url(),
                        attempt = attempt.index,
                        error = %e,
                        "transport failure, not retrying"
                    );
                    return Err(ExchangeError::Transport { message: e.message });
                }
            };

            if let Some(snapshot) = RateLimitSnapshot::from_headers(&response.headers) {
                debug!(
                    exchange = %self.exchange,
                    used_weight = ?snapshot.used_weight,
                    limit = ?snapshot.limit,
                    remaining = ?snapshot.remaining,
                    reset = ?snapshot.reset,
                    "rate limit headers"
                );
            }

            if self.debug_http {
                info!(
                    exchange = %self.exchange,
                    method = %request.method,
                    url = request.redacted_url(),
                    status = response.status,
                    attempt = attempt.index,
                    elapsed_ms = attempt.started.elapsed().as_millis() as u64,
                    body_len = response.body.len(),
                    "http attempt"
                );
            }

            let error = match classify(&response) {
                Classification::Success(body) => return Ok(body),
                Classification::Terminal(e) => return Err(e),
                Classification::Retryable(e) => e,
            };

            if attempt.index >= self.policy.max_retries {
                warn!(
                    exchange = %self.exchange,
                    status = response.status,
                    attempts = attempt.index + 1,
                    "retry budget exhausted"
                );
                return Err(error);
            }

            let retry_after = response
                .header("retry-after")
                .and_then(|v| parse_retry_after(v, self.clock.now()));
            let delay = self
                .policy
                .backoff_delay(attempt.index, retry_after, self.jitter.factor());

            warn!(
                exchange = %self.exchange,
                status = response.status,
                attempt = attempt.index,
                delay_ms = delay.as_millis() as u64,
                retry_after_ms = retry_after.map(|d| d.as_millis() as u64),
                "retryable response, backing off"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ExchangeError::Cancelled),
                _ = self.clock.sleep(delay) => {}
            }

            attempt = attempt.next();
        }
    }
}
