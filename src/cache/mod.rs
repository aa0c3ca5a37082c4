//! HTTP cache freshness policy and the cache store collaborator.

mod entry;
pub mod http_date;
mod policy;
mod store;

pub use entry::CacheEntry;
pub use policy::{
    derive_cache_entry, now_epoch_ms, parse_cache_headers, parse_charset,
    parse_charset_or_default, CacheDirectives, DEFAULT_CONTENT_CHARSET,
};
pub use store::{Cache, MemoryCache, MemoryCacheConfig};
