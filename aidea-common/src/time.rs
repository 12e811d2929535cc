//! Timestamp utilities
//!
//! Day-file timestamps are local wall-clock times without a zone. Older files
//! carry RFC 3339 or the verbose `2006-01-02 15:04:05.999999 -0700 MST m=+0.0`
//! form, both of which are still accepted when reading.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, Timelike};

/// Simplified timestamp format written to day-files
pub const SIMPLE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Date stamp used in day-file names and URL paths
pub const DATE_STAMP_FORMAT: &str = "%Y%m%d";

/// Legacy verbose layout, after the trailing monotonic reading is stripped
const LEGACY_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f %z";

/// Get current local timestamp, truncated to whole seconds
pub fn now() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

/// Get the current local calendar date
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Format a timestamp in the simplified day-file form
pub fn format_simple(ts: &NaiveDateTime) -> String {
    ts.format(SIMPLE_FORMAT).to_string()
}

/// Format a date as `YYYYMMDD`
pub fn date_stamp(date: NaiveDate) -> String {
    date.format(DATE_STAMP_FORMAT).to_string()
}

/// Parse a `YYYYMMDD` date stamp
///
/// Requires exactly eight ASCII digits forming a real calendar date.
pub fn parse_date_stamp(s: &str) -> Option<NaiveDate> {
    if s.len() != 8 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveDate::parse_from_str(s, DATE_STAMP_FORMAT).ok()
}

/// Parse a stored timestamp, trying each known format in priority order:
/// simplified, RFC 3339, legacy verbose.
///
/// Zone-aware inputs are converted to local wall-clock time.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();

    if let Ok(ts) = NaiveDateTime::parse_from_str(s, SIMPLE_FORMAT) {
        return Some(ts);
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Local).naive_local());
    }

    parse_legacy(s)
}

/// `2025-05-13 09:12:44.123456 -0500 CDT m=+0.000000000`
///
/// Only the date, time and numeric offset carry information; the zone
/// abbreviation and monotonic reading are ignored.
fn parse_legacy(s: &str) -> Option<NaiveDateTime> {
    let mut parts = s.split_whitespace();
    let date = parts.next()?;
    let time = parts.next()?;
    let offset = parts.next()?;
    let candidate = format!("{} {} {}", date, time, offset);

    DateTime::parse_from_str(&candidate, LEGACY_FORMAT)
        .ok()
        .map(|ts| ts.with_timezone(&Local).naive_local())
}
