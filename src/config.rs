//! Dispatcher configuration loading from environment variables.
//!
//! All values are read from `FETCH_CORE_*` environment variables with
//! sensible defaults. Invalid values fall back to defaults without crashing.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `FETCH_CORE_POOL_SIZE` | 4 | Dispatch worker threads |
//! | `FETCH_CORE_THREAD_STACK_SIZE` | 0 | Worker stack size in bytes (0 = platform default) |
//! | `FETCH_CORE_CACHE_MAX_ENTRIES` | 512 | In-memory cache capacity |
//! | `FETCH_CORE_SLOW_REQUEST_MS` | 3000 | Requests slower than this are logged at warn |
//! | `FETCH_CORE_LOG_LEVEL` | info | `EnvFilter` directive |
//! | `FETCH_CORE_LOG_FORMAT` | json | `json`, `pretty` or `compact` |

use std::num::NonZeroUsize;
use std::time::Duration;

use crate::cache::MemoryCacheConfig;
use crate::dispatch::{DispatchPoolConfig, RequestQueueConfig};
use crate::telemetry::{LogConfig, LogFormat};
use crate::DispatcherConfig;

/// Effective configuration summary, for logging at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveConfig {
    pub pool_size: usize,
    pub thread_stack_size: usize,
    pub cache_max_entries: usize,
    pub slow_request_ms: u64,
    pub log_level: String,
    pub log_format: LogFormat,
}

/// All configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub dispatcher: DispatcherConfig,
    pub log: LogConfig,
}

/// Parse a `usize` env var, returning `default` on missing or invalid.
fn parse_usize(key: &str, default: usize) -> usize {
    match std::env::var(key) {
        Ok(val) => val.parse::<usize>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Parse a `u64` env var, returning `default` on missing or invalid.
fn parse_u64(key: &str, default: u64) -> u64 {
    match std::env::var(key) {
        Ok(val) => val.parse::<u64>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Load pool configuration from environment.
fn load_pool_config() -> DispatchPoolConfig {
    let defaults = DispatchPoolConfig::default();
    let pool_size = parse_usize("FETCH_CORE_POOL_SIZE", defaults.pool_size.get());
    let pool_size = NonZeroUsize::new(pool_size.min(256)).unwrap_or(defaults.pool_size);
    let stack_size = parse_usize("FETCH_CORE_THREAD_STACK_SIZE", 0);
    // floor: 64 KiB, anything smaller cannot host a runtime
    let stack_size = if stack_size == 0 { 0 } else { stack_size.max(64 * 1024) };
    DispatchPoolConfig { pool_size, stack_size, ..defaults }
}

/// Load queue configuration from environment.
fn load_queue_config() -> RequestQueueConfig {
    let default_ms = RequestQueueConfig::default().slow_request_threshold.as_millis() as u64;
    let slow_ms = parse_u64("FETCH_CORE_SLOW_REQUEST_MS", default_ms);
    RequestQueueConfig { slow_request_threshold: Duration::from_millis(slow_ms.max(1)) }
}

/// Load cache configuration from environment.
fn load_cache_config() -> MemoryCacheConfig {
    let max_entries = parse_usize("FETCH_CORE_CACHE_MAX_ENTRIES", MemoryCacheConfig::default().max_entries);
    MemoryCacheConfig { max_entries: max_entries.max(1) }
}

/// Load logging configuration from environment.
fn load_log_config() -> LogConfig {
    let defaults = LogConfig::default();
    let level = std::env::var("FETCH_CORE_LOG_LEVEL")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or(defaults.level);
    let format = std::env::var("FETCH_CORE_LOG_FORMAT")
        .ok()
        .and_then(|v| LogFormat::from_name(&v))
        .unwrap_or(defaults.format);
    LogConfig { format, level, output_path: defaults.output_path }
}

/// Load all configuration from environment variables.
///
/// Missing or invalid values fall back to safe defaults without panicking.
pub fn load() -> EnvConfig {
    EnvConfig {
        dispatcher: DispatcherConfig {
            pool: load_pool_config(),
            queue: load_queue_config(),
            cache: load_cache_config(),
        },
        log: load_log_config(),
    }
}

impl EnvConfig {
    pub fn effective_config(&self) -> EffectiveConfig {
        EffectiveConfig {
            pool_size: self.dispatcher.pool.pool_size.get(),
            thread_stack_size: self.dispatcher.pool.stack_size,
            cache_max_entries: self.dispatcher.cache.max_entries,
            slow_request_ms: self.dispatcher.queue.slow_request_threshold.as_millis() as u64,
            log_level: self.log.level.clone(),
            log_format: self.log.format,
        }
    }
}
