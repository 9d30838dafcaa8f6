//! Timestamp utilities
//!
//! Timestamps are stored as RFC 3339 TEXT columns.

use crate::{Error, Result};
use chrono::{DateTime, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Format a timestamp for storage
pub fn to_db(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

/// Parse a stored timestamp column
pub fn from_db(column: &str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Failed to parse {}: {}", column, e)))
}

/// Parse a nullable timestamp column
pub fn from_db_optional(column: &str, value: Option<String>) -> Result<Option<DateTime<Utc>>> {
    value.map(|v| from_db(column, &v)).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_now_returns_recent_timestamp() {
        let timestamp = now();
        assert!(timestamp.timestamp() > 946_684_800); // 2000-01-01 00:00:00 UTC
        assert!(timestamp.timestamp() < 4_102_444_800); // 2100-01-01 00:00:00 UTC
    }

    #[tokio::test]
    async fn test_now_successive_calls_advance() {
        let time1 = now();
        tokio::time::sleep(Duration::from_millis(10)).await;
        let time2 = now();
        assert!(time2 > time1);
    }

    #[test]
    fn test_db_roundtrip_preserves_instant() {
        let ts = now();
        let parsed = from_db("created_at", &to_db(&ts)).unwrap();
        assert_eq!(parsed, ts);
    }

    #[test]
    fn test_from_db_reports_column() {
        let err = from_db("accepted_at", "yesterday").unwrap_err();
        assert!(err.to_string().contains("accepted_at"));
    }

    #[test]
    fn test_from_db_optional_null() {
        assert!(from_db_optional("accepted_at", None).unwrap().is_none());
    }
}
