//! Cache freshness policy.
//!
//! Derives soft and hard expiry from response headers. Malformed dates and
//! numbers degrade to "absent" instead of failing: a server emitting a bad
//! `Expires` still gets its `ETag` cached.
//!
//! Precedence:
//! 1. `Cache-Control: no-cache` / `no-store` makes the response uncacheable.
//! 2. Any `Cache-Control` header wins over `Expires`, even a stricter one.
//! 3. `Expires` relative to `Date` is used only without `Cache-Control`.
//! 4. Otherwise the entry is stored always-stale, as a validator carrier.

use std::borrow::Cow;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use http::header::{CACHE_CONTROL, CONTENT_TYPE, DATE, ETAG, EXPIRES, LAST_MODIFIED};
use http::{HeaderMap, HeaderName};

use super::entry::CacheEntry;
use super::http_date::parse_date_as_epoch;
use crate::network::NetworkResponse;

/// Charset assumed when `Content-Type` names none.
pub const DEFAULT_CONTENT_CHARSET: &str = "ISO-8859-1";

const MAX_AGE: &str = "max-age=";
const STALE_WHILE_REVALIDATE: &str = "stale-while-revalidate=";

/// Parsed `Cache-Control` response directives relevant to freshness.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheDirectives {
    /// `no-cache` or `no-store` was present.
    pub uncacheable: bool,
    /// `max-age` in seconds, `None` when absent or malformed.
    pub max_age: Option<u64>,
    /// `stale-while-revalidate` in seconds, `None` when absent or malformed.
    pub stale_while_revalidate: Option<u64>,
    /// `must-revalidate` or `proxy-revalidate` was present.
    pub must_revalidate: bool,
}

impl CacheDirectives {
    /// Tokenize a `Cache-Control` value. Stops at the first `no-cache`/`no-store`.
    pub fn parse(value: &str) -> Self {
        let mut directives = Self::default();

        for token in value.split(',').map(str::trim) {
            match token {
                "no-cache" | "no-store" => {
                    directives.uncacheable = true;
                    return directives;
                }
                "must-revalidate" | "proxy-revalidate" => directives.must_revalidate = true,
                _ => {
                    if let Some(seconds) = token.strip_prefix(MAX_AGE) {
                        if let Some(seconds) = parse_seconds(seconds) {
                            directives.max_age = Some(seconds);
                        }
                    } else if let Some(seconds) = token.strip_prefix(STALE_WHILE_REVALIDATE) {
                        if let Some(seconds) = parse_seconds(seconds) {
                            directives.stale_while_revalidate = Some(seconds);
                        }
                    }
                }
            }
        }

        directives
    }
}

fn parse_seconds(value: &str) -> Option<u64> {
    value.parse::<u64>().ok()
}

fn seconds_to_ms(seconds: u64) -> u64 {
    seconds.saturating_mul(1000)
}

/// First value of `name`, decoded lossily so opaque bytes never hide a header.
fn header_str<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Option<Cow<'a, str>> {
    headers.get(name).map(|v| String::from_utf8_lossy(v.as_bytes()))
}

/// All `Cache-Control` lines joined into one directive list.
fn cache_control(headers: &HeaderMap) -> Option<String> {
    let values: Vec<Cow<'_, str>> = headers
        .get_all(CACHE_CONTROL)
        .iter()
        .map(|v| String::from_utf8_lossy(v.as_bytes()))
        .collect();
    (!values.is_empty()).then(|| values.join(","))
}

/// Derive a cache entry from response headers at `now_ms`.
///
/// Returns `None` when the response must never be cached.
pub fn derive_cache_entry(headers: &HeaderMap, data: Bytes, now_ms: u64) -> Option<CacheEntry> {
    let server_date = header_str(headers, &DATE).map_or(0, |v| parse_date_as_epoch(&v));

    let control = cache_control(headers);
    let directives = match control.as_deref() {
        Some(value) => {
            let directives = CacheDirectives::parse(value);
            if directives.uncacheable {
                return None;
            }
            Some(directives)
        }
        None => None,
    };

    let server_expires = header_str(headers, &EXPIRES).map_or(0, |v| parse_date_as_epoch(&v));
    let last_modified = header_str(headers, &LAST_MODIFIED).map_or(0, |v| parse_date_as_epoch(&v));
    let etag = header_str(headers, &ETAG).map(Cow::into_owned);

    let (soft_ttl, ttl) = match directives {
        Some(d) => {
            let soft = now_ms.saturating_add(seconds_to_ms(d.max_age.unwrap_or(0)));
            let hard = if d.must_revalidate {
                soft
            } else {
                soft.saturating_add(seconds_to_ms(d.stale_while_revalidate.unwrap_or(0)))
            };
            (soft, hard)
        }
        // Expires is a soft expiry; stale-while-revalidate never widens it.
        None if server_date > 0 && server_expires >= server_date => {
            let soft = now_ms.saturating_add(server_expires - server_date);
            (soft, soft)
        }
        None => (0, 0),
    };

    Some(CacheEntry {
        data,
        etag,
        soft_ttl,
        ttl,
        server_date,
        last_modified,
        response_headers: headers.clone(),
    })
}

/// Derive a cache entry for a network response using the current wall clock.
pub fn parse_cache_headers(response: &NetworkResponse) -> Option<CacheEntry> {
    derive_cache_entry(&response.headers, response.data.clone(), now_epoch_ms())
}

/// Charset named by `Content-Type`, or `default` when none is given.
///
/// The parameter key is matched exactly against `charset`.
pub fn parse_charset(headers: &HeaderMap, default: &str) -> String {
    header_str(headers, &CONTENT_TYPE)
        .and_then(|content_type| {
            content_type.split(';').skip(1).find_map(|param| {
                let mut pair = param.trim().split('=');
                match (pair.next(), pair.next(), pair.next()) {
                    (Some("charset"), Some(charset), None) if !charset.is_empty() => {
                        Some(charset.to_owned())
                    }
                    _ => None,
                }
            })
        })
        .unwrap_or_else(|| default.to_owned())
}

/// [`parse_charset`] with the HTTP/1.1 default of ISO-8859-1.
pub fn parse_charset_or_default(headers: &HeaderMap) -> String {
    parse_charset(headers, DEFAULT_CONTENT_CHARSET)
}

/// Wall clock in epoch milliseconds.
pub fn now_epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{HeaderName, HeaderValue};

    const NOW: u64 = 1_700_000_000_000;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            let name = HeaderName::from_bytes(name.as_bytes()).unwrap();
            map.append(name, HeaderValue::from_static(value));
        }
        map
    }

    fn derive(pairs: &[(&'static str, &'static str)]) -> Option<CacheEntry> {
        derive_cache_entry(&headers(pairs), Bytes::from_static(b"body"), NOW)
    }

    #[test]
    fn directives_parse_all_known_tokens() {
        let d = CacheDirectives::parse("max-age=60, stale-while-revalidate=30, proxy-revalidate");
        assert_eq!(d.max_age, Some(60));
        assert_eq!(d.stale_while_revalidate, Some(30));
        assert!(d.must_revalidate);
        assert!(!d.uncacheable);
    }

    #[test]
    fn directives_ignore_malformed_numbers() {
        let d = CacheDirectives::parse("max-age=soon, stale-while-revalidate=-4");
        assert_eq!(d.max_age, None);
        assert_eq!(d.stale_while_revalidate, None);
    }

    #[test]
    fn no_store_anywhere_is_uncacheable() {
        assert!(derive(&[("cache-control", "max-age=60, no-store")]).is_none());
        assert!(derive(&[("cache-control", "  no-cache  ")]).is_none());
        assert!(derive(&[
            ("cache-control", "public,no-cache,max-age=10"),
            ("etag", "\"v1\""),
            ("expires", "Sun, 06 Nov 1994 08:51:37 GMT"),
        ])
        .is_none());
    }

    #[test]
    fn no_store_on_second_header_line_is_uncacheable() {
        assert!(derive(&[("cache-control", "max-age=60"), ("cache-control", "no-store")]).is_none());
    }

    fn with_raw(pairs: &[(&'static str, &'static [u8])]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(*name, HeaderValue::from_bytes(value).unwrap());
        }
        map
    }

    #[test]
    fn no_store_with_opaque_bytes_is_uncacheable() {
        let h = with_raw(&[("cache-control", &b"no-store, x-note=\"caf\xe9\""[..])]);
        assert!(derive_cache_entry(&h, Bytes::new(), NOW).is_none());
    }

    #[test]
    fn cache_control_with_opaque_bytes_still_beats_expires() {
        let h = with_raw(&[
            ("cache-control", &b"max-age=60, x-note=\"caf\xe9\""[..]),
            ("date", &b"Sun, 06 Nov 1994 08:49:37 GMT"[..]),
            ("expires", &b"Sun, 06 Nov 1994 08:51:37 GMT"[..]),
        ]);
        let e = derive_cache_entry(&h, Bytes::new(), NOW).unwrap();
        assert_eq!((e.soft_ttl, e.ttl), (NOW + 60_000, NOW + 60_000));
    }

    #[test]
    fn etag_with_opaque_bytes_is_kept() {
        let h = with_raw(&[("etag", &b"\"v\xe9\""[..])]);
        let e = derive_cache_entry(&h, Bytes::new(), NOW).unwrap();
        assert_eq!(e.etag.as_deref(), Some("\"v\u{FFFD}\""));
    }

    #[test]
    fn max_age_sets_equal_soft_and_hard_expiry() {
        let e = derive(&[("cache-control", "max-age=60")]).unwrap();
        assert_eq!(e.soft_ttl, NOW + 60_000);
        assert_eq!(e.ttl, e.soft_ttl);
    }

    #[test]
    fn must_revalidate_suppresses_stale_window() {
        let e = derive(&[("cache-control", "max-age=60, stale-while-revalidate=30, must-revalidate")])
            .unwrap();
        assert_eq!(e.ttl, e.soft_ttl);
    }

    #[test]
    fn stale_while_revalidate_widens_hard_expiry() {
        let e = derive(&[("cache-control", "max-age=60, stale-while-revalidate=30")]).unwrap();
        assert_eq!(e.soft_ttl, NOW + 60_000);
        assert_eq!(e.ttl, e.soft_ttl + 30_000);
    }

    #[test]
    fn bare_cache_control_beats_expires() {
        let e = derive(&[
            ("cache-control", "public"),
            ("date", "Sun, 06 Nov 1994 08:49:37 GMT"),
            ("expires", "Sun, 06 Nov 1994 08:51:37 GMT"),
        ])
        .unwrap();
        assert_eq!(e.soft_ttl, NOW);
        assert_eq!(e.ttl, NOW);
    }

    #[test]
    fn expires_relative_to_date() {
        let e = derive(&[
            ("date", "Sun, 06 Nov 1994 08:49:37 GMT"),
            ("expires", "Sun, 06 Nov 1994 08:51:37 GMT"),
        ])
        .unwrap();
        assert_eq!(e.soft_ttl, NOW + 120_000);
        assert_eq!(e.ttl, e.soft_ttl);
        assert_eq!(e.server_date, 784_111_777_000);
    }

    #[test]
    fn expires_before_date_yields_no_expiry() {
        let e = derive(&[
            ("date", "Sun, 06 Nov 1994 08:49:37 GMT"),
            ("expires", "Sun, 06 Nov 1994 08:48:37 GMT"),
        ])
        .unwrap();
        assert_eq!((e.soft_ttl, e.ttl), (0, 0));
    }

    #[test]
    fn malformed_dates_are_absent_not_fatal() {
        let e = derive(&[
            ("date", "yesterday"),
            ("expires", "tomorrow"),
            ("last-modified", "never"),
            ("etag", "\"v2\""),
        ])
        .unwrap();
        assert_eq!((e.server_date, e.last_modified, e.soft_ttl, e.ttl), (0, 0, 0, 0));
        assert_eq!(e.etag.as_deref(), Some("\"v2\""));
    }

    #[test]
    fn entry_keeps_body_validators_and_headers() {
        let e = derive(&[
            ("ETag", "\"abc\""),
            ("Last-Modified", "Sun, 06 Nov 1994 08:49:37 GMT"),
            ("X-Custom", "1"),
        ])
        .unwrap();
        assert_eq!(e.data, Bytes::from_static(b"body"));
        assert_eq!(e.etag.as_deref(), Some("\"abc\""));
        assert_eq!(e.last_modified, 784_111_777_000);
        assert_eq!(e.response_headers.get("x-custom").unwrap(), "1");
    }

    #[test]
    fn charset_from_content_type() {
        let h = headers(&[("content-type", "text/html; charset=UTF-8")]);
        assert_eq!(parse_charset(&h, "ISO-8859-1"), "UTF-8");
    }

    #[test]
    fn charset_falls_back_to_default() {
        let h = headers(&[("content-type", "text/html")]);
        assert_eq!(parse_charset(&h, "ISO-8859-1"), "ISO-8859-1");
        assert_eq!(parse_charset_or_default(&HeaderMap::new()), DEFAULT_CONTENT_CHARSET);
    }

    #[test]
    fn charset_key_match_is_exact() {
        let h = headers(&[("content-type", "text/plain; Charset=UTF-8; charset=utf-16")]);
        assert_eq!(parse_charset(&h, "x"), "utf-16");
        let h = headers(&[("content-type", "charset=UTF-8")]);
        assert_eq!(parse_charset(&h, "x"), "x");
    }
}
