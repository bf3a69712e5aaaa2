//! Timestamp encoding for TEXT columns.
//!
//! Timestamps are stored as RFC 3339 UTC strings with full sub-second
//! precision so a value read back compares equal to the value written.

use chrono::{DateTime, SecondsFormat, Utc};
use tokio_rusqlite::rusqlite;

/// Encode a timestamp for storage.
pub fn encode(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Decode a stored timestamp inside a row mapper.
pub(crate) fn decode_column(idx: usize, raw: &str) -> Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_encode_decode_exact() {
        let now = Utc::now();
        let decoded = decode_column(0, &encode(&now)).unwrap();
        assert_eq!(decoded, now);
    }

    #[test]
    fn test_encode_format() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        assert_eq!(encode(&ts), "2024-03-01T12:30:00Z");
    }

    #[test]
    fn test_decode_invalid() {
        assert!(decode_column(2, "yesterday").is_err());
    }
}
