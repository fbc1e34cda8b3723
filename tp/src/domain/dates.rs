//! Lenient date parsing for model output

use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// Parse a calendar date from `YYYY-MM-DD`, an RFC 3339 timestamp, or a naive
/// `YYYY-MM-DDTHH:MM[:SS]` datetime. Only the date part is kept.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|dt| dt.date())
}
