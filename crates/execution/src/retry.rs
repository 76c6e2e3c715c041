//! Retry policy, backoff computation and the time/randomness seams the
//! executor depends on.
//!
//! `delay = min(retry_after ?? retry_delay * 2^attempt, max_backoff) * jitter`
//! with `jitter` uniform in `[0.5, 1.5]`. Both the clock (including sleeping)
//! and the jitter source are traits so tests can drive retries without real
//! time passing.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use exrelay_core::config::RetryConfig;

/// Lower bound of the jitter factor.
pub const JITTER_MIN: f64 = 0.5;
/// Upper bound of the jitter factor.
pub const JITTER_MAX: f64 = 1.5;

/// Bounded retry budget for HTTP 429 and 5xx responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Base delay before the first retry, doubled per attempt.
    pub retry_delay: Duration,
    /// Ceiling on the pre-jitter delay.
    pub max_backoff: Duration,
    /// Retries after the first attempt; total attempts = `max_retries + 1`.
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_millis(200),
            max_backoff: Duration::from_millis(2_000),
            max_retries: 2,
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(cfg: &RetryConfig) -> Self {
        Self {
            retry_delay: Duration::from_millis(cfg.retry_delay_ms),
            max_backoff: Duration::from_millis(cfg.max_backoff_ms),
            max_retries: cfg.max_retries,
        }
    }
}

impl RetryPolicy {
    /// Pre-jitter delay after a failed attempt `attempt` (0-based).
    ///
    /// A server-supplied `Retry-After` replaces the exponential term; either
    /// way the result is capped at `max_backoff`.
    pub fn backoff_base(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let base = retry_after.unwrap_or_else(|| {
            self.retry_delay
                .saturating_mul(2u32.saturating_pow(attempt))
        });
        base.min(self.max_backoff)
    }

    /// Jittered delay: `base * factor`, factor clamped to `[0.5, 1.5]`.
    /// Saturates at `Duration::MAX`.
    pub fn backoff_delay(&self, attempt: u32, retry_after: Option<Duration>, factor: f64) -> Duration {
        let factor = factor.clamp(JITTER_MIN, JITTER_MAX);
        let base = self.backoff_base(attempt, retry_after);
        Duration::try_from_secs_f64(base.as_secs_f64() * factor).unwrap_or(Duration::MAX)
    }
}

/// Parse a `Retry-After` header value relative to `now`.
///
/// Numeric values are seconds. Anything else is tried as an HTTP date.
/// Non-positive or unparsable values yield `None` so the caller falls back
/// to exponential backoff.
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(secs) = value.parse::<f64>() {
        if !secs.is_finite() {
            return None;
        }
        let millis = (secs * 1000.0) as u64;
        return (millis > 0).then(|| Duration::from_millis(millis));
    }

    let at = DateTime::parse_from_rfc2822(value).ok()?;
    let millis = (at.with_timezone(&Utc) - now).num_milliseconds();
    if millis > 0 {
        Some(Duration::from_millis(millis as u64))
    } else {
        None
    }
}

/// Wall-clock time and sleeping.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    async fn sleep(&self, duration: Duration);
}

/// Real time, sleeping on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Source of the backoff jitter factor.
pub trait Jitter: Send + Sync {
    /// A factor in `[JITTER_MIN, JITTER_MAX]`.
    fn factor(&self) -> f64;
}

/// Uniformly random jitter.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomJitter;

impl Jitter for RandomJitter {
    fn factor(&self) -> f64 {
        JITTER_MIN + rand::random::<f64>() * (JITTER_MAX - JITTER_MIN)
    }
}
