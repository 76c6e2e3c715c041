//! Logging and tracing initialization for exrelay.
//!
//! [`init_tracing`] configures structured logging from a [`LoggingConfig`]:
//! - **JSON mode** (`json = true`): one JSON object per line with
//!   millisecond UTC timestamps, for log aggregation.
//! - **Pretty mode** (`json = false`): human-readable colored output.
//!
//! Both modes respect `RUST_LOG` (e.g. `RUST_LOG=exrelay_execution=debug`).
//!
//! A [`SecretSanitizer`] layer watches every span and event for fields that
//! carry credentials, bearer tokens or key material and raises a warning so
//! the offending call site gets fixed.

use std::fmt;

use tracing::field::{Field, Visit};
use tracing::span;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LoggingConfig;

/// Initialize the global tracing subscriber.
///
/// Defaults to `info` when `RUST_LOG` is unset, or `debug` for the execution
/// crate when `debug_http` is on. Calling it twice is harmless: the second
/// call leaves the first subscriber in place.
pub fn init_tracing(config: &LoggingConfig) {
    let default_filter = if config.debug_http {
        "info,exrelay_execution=debug"
    } else {
        "info"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(SecretSanitizer);

    let result = if config.json {
        let json_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_timer(UtcMillisTimer)
            .with_target(true)
            .with_current_span(false);
        registry.with(json_layer).try_init()
    } else {
        let pretty_layer = tracing_subscriber::fmt::layer()
            .with_timer(UtcMillisTimer)
            .with_target(true);
        registry.with(pretty_layer).try_init()
    };

    if let Err(e) = result {
        tracing::debug!(error = %e, "tracing subscriber already installed");
    }
}

/// RFC 3339 UTC timer with millisecond precision.
#[derive(Debug, Clone)]
struct UtcMillisTimer;

impl tracing_subscriber::fmt::time::FormatTime for UtcMillisTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> fmt::Result {
        let now = chrono::Utc::now();
        write!(w, "{}", now.format("%Y-%m-%dT%H:%M:%S%.3fZ"))
    }
}

/// A tracing layer that flags spans and events leaking credentials.
///
/// Triggers on:
/// - fields named like credentials (`api_key`, `secret`, `authorization`, ...)
/// - values shaped like a compact JWT (`eyJ...` with three segments)
/// - values containing a PEM header
/// - long lowercase hex strings such as HMAC signatures
#[derive(Debug, Clone)]
pub struct SecretSanitizer;

impl<S> Layer<S> for SecretSanitizer
where
    S: tracing::Subscriber + for<'lookup> tracing_subscriber::registry::LookupSpan<'lookup>,
{
    fn on_new_span(
        &self,
        attrs: &span::Attributes<'_>,
        _id: &span::Id,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let mut visitor = SecretCheckVisitor::default();
        attrs.record(&mut visitor);
        if let Some(field) = visitor.flagged {
            tracing::warn!(
                field,
                "possible credential recorded in span fields; remove it from the call site"
            );
        }
    }

    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let mut visitor = SecretCheckVisitor::default();
        event.record(&mut visitor);
        if let Some(field) = visitor.flagged {
            tracing::warn!(
                field,
                "possible credential recorded in event fields; remove it from the call site"
            );
        }
    }
}

/// Field names that always indicate secrets regardless of value.
const SENSITIVE_FIELD_NAMES: &[&str] = &[
    "api_key",
    "api_secret",
    "secret",
    "secret_key",
    "private_key",
    "signature",
    "authorization",
    "token",
    "jwt",
];

/// Records the name of the first field that looks like it carries a secret.
#[derive(Default)]
struct SecretCheckVisitor {
    flagged: Option<&'static str>,
}

impl SecretCheckVisitor {
    fn flag(&mut self, field: &Field) {
        if self.flagged.is_none() {
            self.flagged = Some(field.name());
        }
    }

    /// Check if a string value looks like key material or a token.
    fn looks_like_secret(value: &str) -> bool {
        if value.contains("PRIVATE KEY-----") {
            return true;
        }
        let token = value.trim().trim_start_matches("Bearer ");
        if token.starts_with("eyJ") && token.split('.').count() == 3 {
            return true;
        }
        // HMAC-SHA256 hex digests are exactly 64 chars.
        value.len() >= 64 && value.chars().all(|c| c.is_ascii_hexdigit())
    }
}

impl Visit for SecretCheckVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if SENSITIVE_FIELD_NAMES.contains(&field.name()) {
            self.flag(field);
        } else if Self::looks_like_secret(&format!("{:?}", value)) {
            self.flag(field);
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if SENSITIVE_FIELD_NAMES.contains(&field.name()) || Self::looks_like_secret(value) {
            self.flag(field);
        }
    }
}
