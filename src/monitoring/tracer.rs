/*!
 * Structured Tracing
 * Subscriber setup and capability-call spans using the tracing crate
 *
 * Features:
 * - Trace ID per gated capability call for request correlation
 * - JSON-formatted logs for structured parsing
 * - Decision and duration recorded on every capability span
 */

use tracing::{debug, info, span, warn, Level, Span};
use tracing_subscriber::{
    fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};
use std::time::Instant;
use uuid::Uuid;

/// Capability calls slower than this are logged at warn
const SLOW_CALL_MS: u128 = 250;

/// Initialize structured tracing from the environment
///
/// Environment variables:
/// - RUST_LOG: Set log level (default: info)
/// - SANDBOX_TRACE_JSON: Enable JSON output (default: false)
pub fn init_tracing() {
    let use_json = std::env::var("SANDBOX_TRACE_JSON")
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false);
    init_tracing_with(use_json);
}

/// Initialize structured tracing; a no-op if a global subscriber already exists
pub fn init_tracing_with(use_json: bool) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = if use_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()
            .is_ok()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_line_number(true)
                    .with_file(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .compact(),
            )
            .try_init()
            .is_ok()
    };

    if installed {
        info!(json = use_json, "Sandbox tracing initialized");
    }
}

/// Generate a unique trace ID for request correlation
pub fn generate_trace_id() -> String {
    Uuid::new_v4().to_string()
}

/// Span covering one gated capability call
pub struct CapabilitySpan {
    span: Span,
    start: Instant,
    trace_id: String,
}

impl CapabilitySpan {
    pub fn new(plugin_id: &str, capability: &'static str) -> Self {
        let trace_id = generate_trace_id();
        let span = span!(
            Level::DEBUG,
            "capability",
            trace_id = %trace_id,
            plugin_id = plugin_id,
            capability = capability,
            decision = tracing::field::Empty,
            error = tracing::field::Empty,
            duration_us = tracing::field::Empty,
        );

        Self {
            span,
            start: Instant::now(),
            trace_id,
        }
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    /// Gate passed; the call is being delegated
    pub fn record_allowed(&self) {
        self.span.record("decision", "allow");
    }

    /// Gate rejected the call
    pub fn record_denied(&self, reason: &str) {
        self.span.record("decision", "deny");
        self.span.record("error", reason);
    }

    /// Delegated call failed
    pub fn record_error(&self, error: &str) {
        self.span.record("error", error);
    }
}

impl Drop for CapabilitySpan {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        let _entered = self.span.enter();
        self.span.record("duration_us", duration.as_micros() as u64);

        if duration.as_millis() > SLOW_CALL_MS {
            warn!(
                trace_id = %self.trace_id,
                duration_ms = duration.as_millis() as u64,
                slow = true,
                "slow capability call"
            );
        } else {
            debug!(
                trace_id = %self.trace_id,
                duration_us = duration.as_micros() as u64,
                "capability call completed"
            );
        }
    }
}

/// Helper to create a capability span
#[inline]
pub fn span_capability(plugin_id: &str, capability: &'static str) -> CapabilitySpan {
    CapabilitySpan::new(plugin_id, capability)
}
