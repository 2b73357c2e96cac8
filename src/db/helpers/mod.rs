use std::convert::TryFrom;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};

/// Timestamp layout of rows written by older viewers, implicitly UTC.
const LEGACY_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn to_i64(value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|_| anyhow!("value {value} exceeds SQLite INTEGER range"))
}

pub fn to_u64(value: i64, field: &str) -> Result<u64> {
    u64::try_from(value).map_err(|_| anyhow!("{field} contains negative value {value}"))
}

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, LEGACY_DATETIME_FORMAT)
        .map(|naive| naive.and_utc())
        .with_context(|| format!("failed to parse {field}"))
}

/// Text columns written by older viewers may be NULL.
pub fn text_or_unavailable(value: Option<String>) -> String {
    value.unwrap_or_else(|| crate::telemetry::NOT_AVAILABLE.to_string())
}

/// Escapes `%`, `_` and the escape character itself for `LIKE ... ESCAPE '\'`.
pub fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversions_reject_out_of_range() {
        assert!(to_i64(u64::MAX).is_err());
        assert_eq!(to_u64(7, "count").unwrap(), 7);
        assert!(to_u64(-1, "count").is_err());
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("rec_01"), "%rec\\_01%");
        assert_eq!(like_pattern("50%"), "%50\\%%");
    }

    #[test]
    fn datetime_round_trips_rfc3339() {
        let parsed = parse_datetime("2024-05-01T10:00:00+02:00", "start_time").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2024-05-01T08:00:00+00:00");
        assert!(parse_datetime("yesterday", "start_time").is_err());
    }

    #[test]
    fn datetime_accepts_legacy_layout_as_utc() {
        let parsed = parse_datetime("2024-03-01 09:00:00", "start_time").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2024-03-01T09:00:00+00:00");
        assert!(parse_datetime("2024-03-01 09:00", "start_time").is_err());
    }
}
