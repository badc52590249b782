/*!
 * Monitoring
 * Structured logging for the pool and its runner
 */

mod tracer;

pub use tracer::{init_tracing, init_tracing_with, span_phase, PhaseSpan, SLOW_PHASE, TRACE_JSON_ENV};
