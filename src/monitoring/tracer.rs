/*!
 * Tracing
 * Subscriber setup and timed spans for runner phases
 */

use std::time::{Duration, Instant};
use tracing::{debug, info, span, warn, Level};
use tracing_subscriber::{fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Set to `1` or `true` to emit JSON lines instead of compact text
pub const TRACE_JSON_ENV: &str = "PROCPOOL_TRACE_JSON";

/// Phases slower than this are logged at warn level
pub const SLOW_PHASE: Duration = Duration::from_secs(5);

/// Initialize structured tracing on stderr
///
/// Environment variables:
/// - RUST_LOG: Set log level (default: info)
/// - PROCPOOL_TRACE_JSON: Enable JSON output (default: false)
///
/// Returns false if a global subscriber was already installed.
pub fn init_tracing() -> bool {
    let use_json = std::env::var(TRACE_JSON_ENV)
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false);
    init_tracing_with(use_json)
}

pub fn init_tracing_with(use_json: bool) -> bool {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = if use_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(true)
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
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .compact(),
            )
            .try_init()
            .is_ok()
    };

    if installed {
        debug!(json = use_json, "Structured tracing initialized");
    }
    installed
}

/// Span covering one phase of a run (load, execute, cleanup)
///
/// Logs its duration when dropped.
pub struct PhaseSpan {
    span: tracing::Span,
    name: &'static str,
    start: Instant,
}

impl PhaseSpan {
    pub fn new(name: &'static str) -> Self {
        let span = span!(
            Level::INFO,
            "phase",
            phase = name,
            duration_ms = tracing::field::Empty,
            result = tracing::field::Empty,
        );
        Self {
            span,
            name,
            start: Instant::now(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn record_result(&self, success: bool) {
        self.span.record("result", if success { "success" } else { "error" });
    }

    /// Run `f` inside this span
    pub fn in_scope<T>(&self, f: impl FnOnce() -> T) -> T {
        self.span.in_scope(f)
    }
}

impl Drop for PhaseSpan {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        let _entered = self.span.enter();
        self.span.record("duration_ms", duration.as_millis() as u64);

        if duration > SLOW_PHASE {
            warn!(
                phase = self.name,
                duration_ms = duration.as_millis() as u64,
                slow = true,
                "slow phase"
            );
        } else {
            info!(
                phase = self.name,
                duration_ms = duration.as_millis() as u64,
                "phase completed"
            );
        }
    }
}

pub fn span_phase(name: &'static str) -> PhaseSpan {
    PhaseSpan::new(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_rejected() {
        init_tracing_with(false);
        assert!(!init_tracing_with(true));
    }

    #[test]
    fn test_phase_span_scopes_work() {
        let span = span_phase("load");
        let value = span.in_scope(|| 21 * 2);
        span.record_result(true);

        assert_eq!(value, 42);
        assert_eq!(span.name(), "load");
        assert!(span.elapsed() < SLOW_PHASE);
    }
}
