//! Scoring configurations keyed by curation schema id

use crate::scoring::ScoringConfig;
use gcur_common::{Error, Result};
use sqlx::SqliteConnection;

pub(crate) async fn load(conn: &mut SqliteConnection, schema_id: &str) -> Result<Option<ScoringConfig>> {
    let config: Option<String> =
        sqlx::query_scalar("SELECT config FROM scoring_configurations WHERE schema_id = ?")
            .bind(schema_id)
            .fetch_optional(conn)
            .await?;

    config
        .map(|c| {
            serde_json::from_str(&c).map_err(|e| {
                Error::Internal(format!("Failed to deserialize scoring config '{}': {}", schema_id, e))
            })
        })
        .transpose()
}

pub(crate) async fn save(
    conn: &mut SqliteConnection,
    schema_id: &str,
    config: &ScoringConfig,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO scoring_configurations (schema_id, config, updated_at)
        VALUES (?, ?, ?)
        ON CONFLICT(schema_id) DO UPDATE SET config = excluded.config, updated_at = excluded.updated_at
        "#,
    )
    .bind(schema_id)
    .bind(serde_json::to_string(config)?)
    .bind(gcur_common::time::to_db(&gcur_common::time::now()))
    .execute(conn)
    .await?;
    Ok(())
}
