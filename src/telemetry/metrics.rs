//! Metrics facade calls for dispatch activity.
//!
//! Recording is a no-op until the application installs a `metrics` recorder.

use std::time::Duration;

/// How a single dispatch ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Delivered,
    Failed,
    DiscardedCancelled,
    DiscardedNotModified,
    Unexpected,
}

impl DispatchOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Delivered => "delivered",
            Self::Failed => "failed",
            Self::DiscardedCancelled => "discarded_cancelled",
            Self::DiscardedNotModified => "discarded_not_modified",
            Self::Unexpected => "unexpected",
        }
    }
}

/// Count a finished dispatch and record how long it spent on the network.
pub fn record_dispatch(outcome: DispatchOutcome, network_time: Duration) {
    ::metrics::counter!("fetch_dispatch_total", "outcome" => outcome.as_str()).increment(1);
    ::metrics::histogram!("fetch_dispatch_network_ms").record(network_time.as_secs_f64() * 1000.0);
}

pub fn record_cache_write() {
    ::metrics::counter!("fetch_cache_writes_total").increment(1);
}

pub fn record_queue_depth(depth: usize) {
    ::metrics::gauge!("fetch_queue_depth").set(depth as f64);
}
