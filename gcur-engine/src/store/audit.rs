//! Audit event rows
//!
//! Written inside the mutation transaction so an event exists if and only if
//! the change it describes was committed.

use gcur_common::events::AuditEvent;
use gcur_common::{Error, Result};
use serde::Serialize;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

/// Stored audit event with its sequence number
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditRecord {
    pub sequence: i64,
    pub event: AuditEvent,
}

pub(crate) async fn insert(
    conn: &mut SqliteConnection,
    event: &AuditEvent,
    actor_id: Option<Uuid>,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO audit_events (scope_id, curation_id, event_type, actor_id, payload, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(event.scope_id().to_string())
    .bind(event.curation_id().map(|id| id.to_string()))
    .bind(event.event_type())
    .bind(actor_id.map(|id| id.to_string()))
    .bind(serde_json::to_string(event)?)
    .bind(gcur_common::time::to_db(&event.timestamp()))
    .execute(conn)
    .await?;
    Ok(())
}

pub(crate) async fn list_for_curation(
    conn: &mut SqliteConnection,
    curation_id: Uuid,
) -> Result<Vec<AuditRecord>> {
    let rows = sqlx::query(
        "SELECT id, payload FROM audit_events WHERE curation_id = ? ORDER BY id",
    )
    .bind(curation_id.to_string())
    .fetch_all(conn)
    .await?;

    rows.iter()
        .map(|row| -> Result<AuditRecord> {
            let payload: String = row.try_get("payload")?;
            let event = serde_json::from_str(&payload).map_err(|e| {
                Error::Internal(format!("Failed to deserialize audit event: {}", e))
            })?;
            Ok(AuditRecord {
                sequence: row.try_get("id")?,
                event,
            })
        })
        .collect()
}
