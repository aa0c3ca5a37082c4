//! Telemetry: structured logging setup, dispatch spans and metrics.

mod logging;
mod metrics;
mod spans;

pub use logging::{init_logging, LogConfig, LogError, LogFormat};
pub use metrics::{record_cache_write, record_dispatch, record_queue_depth, DispatchOutcome};
pub use spans::DispatchSpan;
