//! Evidence item rows

use super::{time_col, uuid_col};
use crate::scoring::{EvidenceItem, ItemContribution};
use gcur_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

const COLUMNS: &str =
    "id, curation_id, category, payload, contribution, created_by, created_at, updated_by, updated_at";

fn from_row(row: &SqliteRow) -> Result<EvidenceItem> {
    let payload: String = row.try_get("payload")?;
    let payload = serde_json::from_str(&payload)
        .map_err(|e| Error::Internal(format!("Failed to deserialize evidence payload: {}", e)))?;
    let contribution: Option<String> = row.try_get("contribution")?;
    let contribution = contribution
        .map(|c| serde_json::from_str::<ItemContribution>(&c))
        .transpose()
        .map_err(|e| Error::Internal(format!("Failed to deserialize contribution: {}", e)))?;

    Ok(EvidenceItem {
        id: uuid_col(row, "id")?,
        curation_id: uuid_col(row, "curation_id")?,
        payload,
        contribution,
        created_by: uuid_col(row, "created_by")?,
        created_at: time_col(row, "created_at")?,
        updated_by: uuid_col(row, "updated_by")?,
        updated_at: time_col(row, "updated_at")?,
    })
}

/// All items of a curation, ordered by id
pub(crate) async fn list_for_curation(
    conn: &mut SqliteConnection,
    curation_id: Uuid,
) -> Result<Vec<EvidenceItem>> {
    let sql = format!(
        "SELECT {} FROM evidence_items WHERE curation_id = ? ORDER BY id",
        COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(curation_id.to_string())
        .fetch_all(conn)
        .await?;
    rows.iter().map(from_row).collect()
}

/// Insert or replace one item, keeping the original creator and timestamp
pub(crate) async fn upsert(conn: &mut SqliteConnection, item: &EvidenceItem) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO evidence_items
            (id, curation_id, category, payload, contribution, created_by, created_at, updated_by, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            category = excluded.category,
            payload = excluded.payload,
            contribution = excluded.contribution,
            updated_by = excluded.updated_by,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(item.id.to_string())
    .bind(item.curation_id.to_string())
    .bind(item.category().as_str())
    .bind(serde_json::to_string(&item.payload)?)
    .bind(item.contribution.map(|c| serde_json::to_string(&c)).transpose()?)
    .bind(item.created_by.to_string())
    .bind(gcur_common::time::to_db(&item.created_at))
    .bind(item.updated_by.to_string())
    .bind(gcur_common::time::to_db(&item.updated_at))
    .execute(conn)
    .await?;
    Ok(())
}

pub(crate) async fn set_contribution(
    conn: &mut SqliteConnection,
    item_id: Uuid,
    contribution: Option<ItemContribution>,
) -> Result<()> {
    sqlx::query("UPDATE evidence_items SET contribution = ? WHERE id = ?")
        .bind(contribution.map(|c| serde_json::to_string(&c)).transpose()?)
        .bind(item_id.to_string())
        .execute(conn)
        .await?;
    Ok(())
}

/// Returns false when no such item exists on the curation
pub(crate) async fn delete(
    conn: &mut SqliteConnection,
    curation_id: Uuid,
    item_id: Uuid,
) -> Result<bool> {
    let result = sqlx::query("DELETE FROM evidence_items WHERE curation_id = ? AND id = ?")
        .bind(curation_id.to_string())
        .bind(item_id.to_string())
        .execute(conn)
        .await?;
    Ok(result.rows_affected() > 0)
}
