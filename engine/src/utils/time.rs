//! Time utility functions

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

/// Convert microseconds since Unix epoch to DateTime<Utc>
pub fn micros_to_datetime(micros: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_micros(micros).unwrap_or_else(|| {
        tracing::warn!(micros, "Invalid timestamp, using epoch");
        DateTime::UNIX_EPOCH
    })
}

/// Convert microseconds since Unix epoch to RFC 3339 (microsecond precision, `Z` suffix)
pub fn micros_to_rfc3339(micros: i64) -> String {
    micros_to_datetime(micros).to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse an RFC 3339 timestamp, or a naive `YYYY-MM-DD[ T]HH:MM:SS[.f]` taken as UTC.
pub fn parse_timestamp(ts: &str) -> Option<DateTime<Utc>> {
    let ts = ts.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(ts) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(ts, format).ok())
        .map(|naive| naive.and_utc())
}
