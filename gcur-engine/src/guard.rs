//! Concurrency Guard
//!
//! `apply` is the only code path that increments `lock_version`. It opens a
//! transaction, claims the expected version with a conditional update, runs
//! the mutation on the same transaction and commits. A failed claim or a
//! failed mutation rolls everything back, so stage, version and audit row
//! change together or not at all. Conflicts are returned, never retried.

use crate::error::{CurationError, Result};
use crate::store;
use futures::future::BoxFuture;
use sqlx::{Connection, SqliteConnection};
use tracing::debug;
use uuid::Uuid;

/// Result of a committed mutation
#[derive(Debug, Clone, PartialEq)]
pub struct Applied<T> {
    /// Version after the mutation
    pub new_version: i64,
    pub value: T,
}

/// `Apply(curation_id, expected_version, mutation)`
///
/// The mutation receives the transaction's connection and the new version.
pub async fn apply<T, F>(
    conn: &mut SqliteConnection,
    curation_id: Uuid,
    expected_version: i64,
    mutation: F,
) -> Result<Applied<T>>
where
    F: for<'t> FnOnce(&'t mut SqliteConnection, i64) -> BoxFuture<'t, Result<T>>,
{
    let mut tx = conn.begin().await?;

    let claimed = store::curations::claim_version(&mut *tx, curation_id, expected_version).await?;
    if claimed == 0 {
        let found = store::curations::current_version(&mut *tx, curation_id).await?;
        return match found {
            Some(found) => {
                debug!(
                    curation_id = %curation_id,
                    expected = expected_version,
                    found,
                    "Version conflict"
                );
                Err(CurationError::ConcurrentModification {
                    expected: expected_version,
                    found,
                })
            }
            None => Err(CurationError::NotFound(format!("curation {}", curation_id))),
        };
    }

    let new_version = expected_version + 1;
    let value = mutation(&mut *tx, new_version).await?;
    tx.commit().await?;

    debug!(curation_id = %curation_id, new_version, "Mutation committed");
    Ok(Applied { new_version, value })
}

/// Fail fast when a snapshot is already stale
///
/// The authoritative check is the conditional update inside `apply`.
pub fn check_version(expected: i64, found: i64) -> Result<()> {
    if expected == found {
        Ok(())
    } else {
        Err(CurationError::ConcurrentModification { expected, found })
    }
}
