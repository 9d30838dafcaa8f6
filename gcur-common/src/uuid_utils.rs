//! UUID utilities

use crate::{Error, Result};
use uuid::Uuid;

/// Generate a new UUIDv4
pub fn generate() -> Uuid {
    Uuid::new_v4()
}

/// Parse a UUID stored as TEXT in the database
///
/// A malformed id in a row is corruption, not user input, so it maps to
/// `Error::Internal`.
pub fn parse_column(column: &str, value: &str) -> Result<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| Error::Internal(format!("Invalid UUID in column {}: {}", column, e)))
}

/// Parse an optional UUID column
pub fn parse_optional_column(column: &str, value: Option<String>) -> Result<Option<Uuid>> {
    value.map(|v| parse_column(column, &v)).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_column_roundtrip() {
        let id = generate();
        assert_eq!(parse_column("id", &id.to_string()).unwrap(), id);
    }

    #[test]
    fn test_parse_column_rejects_garbage() {
        let err = parse_column("scope_id", "not-a-uuid").unwrap_err();
        assert!(matches!(err, Error::Internal(msg) if msg.contains("scope_id")));
    }

    #[test]
    fn test_parse_optional_column_none() {
        assert_eq!(parse_optional_column("creator_id", None).unwrap(), None);
    }
}
