//! Shared primitive types used across the ledger.

use chrono::{DateTime, SecondsFormat, Utc};

/// A profile / auth user identifier.
pub type UserId = String;

/// A stable, unique identifier for any stored row.
pub type EntityId = String;

/// Wall-clock instant. Stored as fixed-width RFC 3339 text so that
/// lexical order in SQL matches chronological order.
pub type Timestamp = DateTime<Utc>;

/// Fresh UUID v4 row identifier.
pub fn new_id() -> EntityId {
    uuid::Uuid::new_v4().to_string()
}

pub fn format_ts(ts: &Timestamp) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_ts(raw: &str) -> Result<Timestamp, chrono::ParseError> {
    Ok(DateTime::parse_from_rfc3339(raw)?.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamps_survive_text_storage() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 5).unwrap();
        let raw = format_ts(&ts);
        assert_eq!(raw, "2024-03-01T12:30:05.000000Z");
        assert_eq!(parse_ts(&raw).unwrap(), ts);
    }

    #[test]
    fn formatted_timestamps_sort_chronologically() {
        let a = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let b = a + chrono::Duration::milliseconds(1);
        assert!(format_ts(&a) < format_ts(&b));
    }
}
