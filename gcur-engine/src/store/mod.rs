//! Raw SQL access to the shared store
//!
//! Crate-private on purpose: nothing outside the engine can reach these
//! functions, so every read or write of scope-owned rows goes through the
//! scoped repository and the access evaluator. Functions take a
//! `&mut SqliteConnection` so they run equally on a pooled connection or
//! inside a transaction.

pub(crate) mod approvals;
pub(crate) mod audit;
pub(crate) mod curations;
pub(crate) mod evidence;
pub(crate) mod memberships;
pub(crate) mod scopes;
pub(crate) mod scoring_configs;
pub(crate) mod users;
pub(crate) mod workflow_configs;

use gcur_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::str::FromStr;
use uuid::Uuid;

/// Read a TEXT uuid column
pub(crate) fn uuid_col(row: &SqliteRow, column: &str) -> Result<Uuid> {
    let value: String = row.try_get(column)?;
    gcur_common::uuid_utils::parse_column(column, &value)
}

pub(crate) fn opt_uuid_col(row: &SqliteRow, column: &str) -> Result<Option<Uuid>> {
    let value: Option<String> = row.try_get(column)?;
    gcur_common::uuid_utils::parse_optional_column(column, value)
}

pub(crate) fn time_col(row: &SqliteRow, column: &str) -> Result<chrono::DateTime<chrono::Utc>> {
    let value: String = row.try_get(column)?;
    gcur_common::time::from_db(column, &value)
}

pub(crate) fn opt_time_col(
    row: &SqliteRow,
    column: &str,
) -> Result<Option<chrono::DateTime<chrono::Utc>>> {
    let value: Option<String> = row.try_get(column)?;
    gcur_common::time::from_db_optional(column, value)
}

/// Read a TEXT column holding a `FromStr` enum
pub(crate) fn enum_col<T>(row: &SqliteRow, column: &str) -> Result<T>
where
    T: FromStr<Err = Error>,
{
    let value: String = row.try_get(column)?;
    value
        .parse()
        .map_err(|e| Error::Internal(format!("Corrupt {} column: {}", column, e)))
}
