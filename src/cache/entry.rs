//! Derived cache record for a single response.

use bytes::Bytes;
use http::header::{IF_MODIFIED_SINCE, IF_NONE_MATCH};
use http::{HeaderMap, HeaderValue};

use super::http_date::format_http_date;

/// A cached response body plus the freshness metadata derived from its headers.
///
/// All instants are milliseconds since the Unix epoch; `0` means absent.
/// Entries are never mutated once stored: revalidation produces a new entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheEntry {
    pub data: Bytes,
    pub etag: Option<String>,
    /// Stale after this instant, but still usable while revalidating.
    pub soft_ttl: u64,
    /// Unusable after this instant without a successful revalidation.
    pub ttl: u64,
    pub server_date: u64,
    pub last_modified: u64,
    pub response_headers: HeaderMap,
}

impl CacheEntry {
    /// True when the hard expiry has passed.
    pub fn is_expired(&self, now_ms: u64) -> bool {
        self.ttl < now_ms
    }

    /// True when the soft expiry has passed and a refresh should be issued.
    pub fn refresh_needed(&self, now_ms: u64) -> bool {
        self.soft_ttl < now_ms
    }

    /// Whether the entry carries anything a conditional request can use.
    pub fn has_validators(&self) -> bool {
        self.etag.is_some() || self.last_modified > 0
    }

    /// Validator headers for the next conditional fetch of this resource.
    pub fn conditional_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();

        if let Some(value) = self.etag.as_deref().and_then(|e| HeaderValue::from_str(e).ok()) {
            headers.insert(IF_NONE_MATCH, value);
        }

        let validator = if self.last_modified > 0 { self.last_modified } else { self.server_date };
        if validator > 0 {
            if let Ok(value) = HeaderValue::from_str(&format_http_date(validator)) {
                headers.insert(IF_MODIFIED_SINCE, value);
            }
        }

        headers
    }

    /// Copy of this entry forced stale. `full_expire` also drops the hard expiry.
    pub fn invalidated(&self, full_expire: bool) -> Self {
        Self {
            soft_ttl: 0,
            ttl: if full_expire { 0 } else { self.ttl },
            ..self.clone()
        }
    }
}
