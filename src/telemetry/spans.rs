//! Span helpers for dispatch tracing.

use tracing::{info_span, Span};

use super::metrics::DispatchOutcome;

/// Factory for per-dispatch spans.
pub struct DispatchSpan;

impl DispatchSpan {
    /// Span for one dispatch of one request.
    ///
    /// `outcome` and `network_time_ms` are recorded once the dispatch ends.
    pub fn new(worker: usize, sequence: u64, url: &str) -> Span {
        info_span!(
            "dispatch_request",
            worker,
            sequence,
            url = %url,
            outcome = tracing::field::Empty,
            network_time_ms = tracing::field::Empty,
        )
    }

    pub fn record_outcome(span: &Span, outcome: DispatchOutcome, network_time_ms: u64) {
        span.record("outcome", outcome.as_str());
        span.record("network_time_ms", network_time_ms);
    }
}
