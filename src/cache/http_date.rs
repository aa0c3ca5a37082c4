//! HTTP date parsing and formatting.
//!
//! Accepts the three HTTP-date forms (IMF-fixdate, RFC 850, asctime) plus
//! RFC 2822 as a last resort. Anything else is reported as unparseable and
//! left to the caller to default.

use chrono::{DateTime, NaiveDateTime, Utc};

const IMF_FIXDATE: &str = "%a, %d %b %Y %H:%M:%S GMT";
const RFC_850: &str = "%A, %d-%b-%y %H:%M:%S GMT";
const ASCTIME: &str = "%a %b %e %H:%M:%S %Y";

/// Parse an HTTP date header value.
///
/// Returns `None` for unrecognized formats and for instants before the Unix
/// epoch.
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    let parsed = [IMF_FIXDATE, RFC_850, ASCTIME]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|naive| naive.and_utc())
        .or_else(|| {
            DateTime::parse_from_rfc2822(value)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        })?;

    (parsed.timestamp_millis() >= 0).then_some(parsed)
}

/// Parse an HTTP date as milliseconds since the Unix epoch, `0` when unparseable.
pub fn parse_date_as_epoch(value: &str) -> u64 {
    parse_http_date(value)
        .map(|dt| dt.timestamp_millis() as u64)
        .unwrap_or(0)
}

/// Format epoch milliseconds as an IMF-fixdate string.
pub fn format_http_date(epoch_ms: u64) -> String {
    let millis = i64::try_from(epoch_ms).unwrap_or(i64::MAX);
    DateTime::<Utc>::from_timestamp_millis(millis)
        .unwrap_or_default()
        .format(IMF_FIXDATE)
        .to_string()
}
