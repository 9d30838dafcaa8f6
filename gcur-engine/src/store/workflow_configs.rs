//! Workflow configuration rows
//!
//! `workflow_pair IS NULL` marks the scope-level configuration; partial unique
//! indexes keep one row per (scope) and per (scope, pair).

use super::{opt_uuid_col, time_col, uuid_col};
use crate::review_policy::{ReviewPolicyConfig, WorkflowConfiguration};
use gcur_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

fn from_row(row: &SqliteRow) -> Result<WorkflowConfiguration> {
    let policy: String = row.try_get("policy")?;
    let policy: ReviewPolicyConfig = serde_json::from_str(&policy)
        .map_err(|e| Error::Internal(format!("Failed to deserialize review policy: {}", e)))?;
    Ok(WorkflowConfiguration {
        scope_id: uuid_col(row, "scope_id")?,
        workflow_pair: row.try_get("workflow_pair")?,
        policy,
        updated_by: opt_uuid_col(row, "updated_by")?,
        updated_at: time_col(row, "updated_at")?,
    })
}

/// Exact lookup: `None` pair means the scope-level row only
pub(crate) async fn load(
    conn: &mut SqliteConnection,
    scope_id: Uuid,
    workflow_pair: Option<&str>,
) -> Result<Option<WorkflowConfiguration>> {
    let row = match workflow_pair {
        Some(pair) => {
            sqlx::query(
                r#"
                SELECT scope_id, workflow_pair, policy, updated_by, updated_at
                FROM workflow_configurations WHERE scope_id = ? AND workflow_pair = ?
                "#,
            )
            .bind(scope_id.to_string())
            .bind(pair)
            .fetch_optional(conn)
            .await?
        }
        None => {
            sqlx::query(
                r#"
                SELECT scope_id, workflow_pair, policy, updated_by, updated_at
                FROM workflow_configurations WHERE scope_id = ? AND workflow_pair IS NULL
                "#,
            )
            .bind(scope_id.to_string())
            .fetch_optional(conn)
            .await?
        }
    };
    row.as_ref().map(from_row).transpose()
}

/// Replace the row for (scope, pair), inserting it when absent
pub(crate) async fn save(conn: &mut SqliteConnection, config: &WorkflowConfiguration) -> Result<()> {
    let policy = serde_json::to_string(&config.policy)?;
    let updated_at = gcur_common::time::to_db(&config.updated_at);
    let updated_by = config.updated_by.map(|id| id.to_string());

    let updated = sqlx::query(
        r#"
        UPDATE workflow_configurations
        SET policy = ?, updated_by = ?, updated_at = ?
        WHERE scope_id = ? AND workflow_pair IS ?
        "#,
    )
    .bind(&policy)
    .bind(&updated_by)
    .bind(&updated_at)
    .bind(config.scope_id.to_string())
    .bind(&config.workflow_pair)
    .execute(&mut *conn)
    .await?;

    if updated.rows_affected() == 0 {
        sqlx::query(
            r#"
            INSERT INTO workflow_configurations (id, scope_id, workflow_pair, policy, updated_by, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(gcur_common::uuid_utils::generate().to_string())
        .bind(config.scope_id.to_string())
        .bind(&config.workflow_pair)
        .bind(&policy)
        .bind(&updated_by)
        .bind(&updated_at)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}
