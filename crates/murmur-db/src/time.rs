//! Timestamp encoding for TEXT columns.
//!
//! All timestamps are stored as RFC 3339 UTC strings with millisecond
//! precision and a `Z` suffix, so lexical order equals chronological order.

use chrono::{DateTime, SecondsFormat, Utc};

/// Formats a timestamp for storage.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parses a stored timestamp. Returns `None` for malformed values.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn stored_form_sorts_chronologically() {
        let a = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let b = a + chrono::Duration::milliseconds(1500);
        let (fa, fb) = (format_timestamp(a), format_timestamp(b));
        assert_eq!(fa, "2026-01-02T03:04:05.000Z");
        assert!(fa < fb);
        assert_eq!(parse_timestamp(&fb), Some(b));
        assert_eq!(parse_timestamp("yesterday"), None);
    }
}
