//! Curation rows
//!
//! `lock_version` is only ever incremented by `claim_version`, which the
//! concurrency guard calls; no other statement here touches it.

use super::{enum_col, time_col, uuid_col};
use crate::access::ReadFilter;
use crate::isolation::CurationQuery;
use crate::scoring::ScoreState;
use gcur_common::{Curation, Error, Result, WorkflowStage};
use gcur_common::models::ScoreStatus;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection};
use uuid::Uuid;

const COLUMNS: &str = "c.id, c.scope_id, c.gene_id, c.workflow_pair, c.schema_id, c.creator_id, \
    c.stage, c.lock_version, c.is_current, c.evidence_frozen, c.review_round, c.score, \
    c.classification, c.score_status, c.score_detail, c.created_at, c.updated_at";

fn from_row(row: &SqliteRow) -> Result<Curation> {
    let score_detail: Option<String> = row.try_get("score_detail")?;
    let score_detail = score_detail
        .map(|s| serde_json::from_str(&s))
        .transpose()
        .map_err(|e| Error::Internal(format!("Failed to deserialize score_detail: {}", e)))?;

    Ok(Curation {
        id: uuid_col(row, "id")?,
        scope_id: uuid_col(row, "scope_id")?,
        gene_id: row.try_get("gene_id")?,
        workflow_pair: row.try_get("workflow_pair")?,
        schema_id: row.try_get("schema_id")?,
        creator_id: uuid_col(row, "creator_id")?,
        stage: enum_col(row, "stage")?,
        lock_version: row.try_get("lock_version")?,
        is_current: row.try_get("is_current")?,
        evidence_frozen: row.try_get("evidence_frozen")?,
        review_round: row.try_get("review_round")?,
        score: row.try_get("score")?,
        classification: row.try_get("classification")?,
        score_status: enum_col(row, "score_status")?,
        score_detail,
        created_at: time_col(row, "created_at")?,
        updated_at: time_col(row, "updated_at")?,
    })
}

pub(crate) async fn insert(conn: &mut SqliteConnection, curation: &Curation) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO curations (
            id, scope_id, gene_id, workflow_pair, schema_id, creator_id, stage,
            lock_version, is_current, evidence_frozen, review_round, score,
            classification, score_status, score_detail, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(curation.id.to_string())
    .bind(curation.scope_id.to_string())
    .bind(&curation.gene_id)
    .bind(&curation.workflow_pair)
    .bind(&curation.schema_id)
    .bind(curation.creator_id.to_string())
    .bind(curation.stage.as_str())
    .bind(curation.lock_version)
    .bind(curation.is_current)
    .bind(curation.evidence_frozen)
    .bind(curation.review_round)
    .bind(curation.score)
    .bind(&curation.classification)
    .bind(curation.score_status.as_str())
    .bind(curation.score_detail.as_ref().map(|v| v.to_string()))
    .bind(gcur_common::time::to_db(&curation.created_at))
    .bind(gcur_common::time::to_db(&curation.updated_at))
    .execute(conn)
    .await?;
    Ok(())
}

/// Unfiltered load for store-level tests
#[cfg(test)]
pub(crate) async fn load(conn: &mut SqliteConnection, curation_id: Uuid) -> Result<Option<Curation>> {
    let sql = format!("SELECT {} FROM curations c WHERE c.id = ?", COLUMNS);
    let row = sqlx::query(&sql)
        .bind(curation_id.to_string())
        .fetch_optional(conn)
        .await?;
    row.as_ref().map(from_row).transpose()
}

/// Load one curation if the read filter admits its scope
pub(crate) async fn load_visible(
    conn: &mut SqliteConnection,
    curation_id: Uuid,
    filter: &ReadFilter,
) -> Result<Option<Curation>> {
    let mut qb = QueryBuilder::<Sqlite>::new(format!(
        "SELECT {} FROM curations c JOIN scopes s ON s.id = c.scope_id WHERE c.id = ",
        COLUMNS
    ));
    qb.push_bind(curation_id.to_string());
    qb.push(" AND ");
    filter.push_predicate(&mut qb, "c.scope_id", "s.visibility");

    let row = qb.build().fetch_optional(conn).await?;
    row.as_ref().map(from_row).transpose()
}

/// List curations admitted by the read filter
pub(crate) async fn list_visible(
    conn: &mut SqliteConnection,
    filter: &ReadFilter,
    query: &CurationQuery,
) -> Result<Vec<Curation>> {
    let mut qb = QueryBuilder::<Sqlite>::new(format!(
        "SELECT {} FROM curations c JOIN scopes s ON s.id = c.scope_id WHERE ",
        COLUMNS
    ));
    filter.push_predicate(&mut qb, "c.scope_id", "s.visibility");

    if let Some(scope_id) = query.scope_id {
        qb.push(" AND c.scope_id = ");
        qb.push_bind(scope_id.to_string());
    }
    if let Some(gene_id) = &query.gene_id {
        qb.push(" AND c.gene_id = ");
        qb.push_bind(gene_id.clone());
    }
    if let Some(stage) = query.stage {
        qb.push(" AND c.stage = ");
        qb.push_bind(stage.as_str());
    }
    if query.current_only {
        qb.push(" AND c.is_current = 1");
    }
    qb.push(" ORDER BY c.created_at, c.id");

    let rows = qb.build().fetch_all(conn).await?;
    rows.iter().map(from_row).collect()
}

pub(crate) async fn current_version(
    conn: &mut SqliteConnection,
    curation_id: Uuid,
) -> Result<Option<i64>> {
    Ok(
        sqlx::query_scalar("SELECT lock_version FROM curations WHERE id = ?")
            .bind(curation_id.to_string())
            .fetch_optional(conn)
            .await?,
    )
}

/// Conditional version bump; returns the number of rows updated (0 or 1)
pub(crate) async fn claim_version(
    conn: &mut SqliteConnection,
    curation_id: Uuid,
    expected_version: i64,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE curations
        SET lock_version = lock_version + 1, updated_at = ?
        WHERE id = ? AND lock_version = ?
        "#,
    )
    .bind(gcur_common::time::to_db(&gcur_common::time::now()))
    .bind(curation_id.to_string())
    .bind(expected_version)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

pub(crate) async fn set_stage(
    conn: &mut SqliteConnection,
    curation_id: Uuid,
    stage: WorkflowStage,
    evidence_frozen: bool,
    review_round: i64,
) -> Result<()> {
    sqlx::query(
        "UPDATE curations SET stage = ?, evidence_frozen = ?, review_round = ? WHERE id = ?",
    )
    .bind(stage.as_str())
    .bind(evidence_frozen)
    .bind(review_round)
    .bind(curation_id.to_string())
    .execute(conn)
    .await?;
    Ok(())
}

/// Store the derived score columns
pub(crate) async fn update_score(
    conn: &mut SqliteConnection,
    curation_id: Uuid,
    state: &ScoreState,
) -> Result<()> {
    let (status, score, classification, detail) = match state {
        ScoreState::Pending => (ScoreStatus::Pending, None, None, None),
        ScoreState::Scored(result) => (
            ScoreStatus::Scored,
            Some(result.total_score),
            Some(result.classification.clone()),
            Some(serde_json::to_string(result)?),
        ),
        ScoreState::Incomplete(errors) => (
            ScoreStatus::Incomplete,
            None,
            None,
            Some(serde_json::to_string(errors)?),
        ),
    };

    sqlx::query(
        r#"
        UPDATE curations
        SET score = ?, classification = ?, score_status = ?, score_detail = ?
        WHERE id = ?
        "#,
    )
    .bind(score)
    .bind(classification)
    .bind(status.as_str())
    .bind(detail)
    .bind(curation_id.to_string())
    .execute(conn)
    .await?;
    Ok(())
}

/// Make `current_id` the current record for its gene in a scope
///
/// Other current curations of the gene lose `is_current` and get a new
/// `lock_version`, so a client holding one of them sees a conflict. Returns
/// the ids that were superseded.
pub(crate) async fn supersede_current(
    conn: &mut SqliteConnection,
    scope_id: Uuid,
    gene_id: &str,
    current_id: Uuid,
) -> Result<Vec<Uuid>> {
    let ids: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT id FROM curations
        WHERE scope_id = ? AND gene_id = ? AND id != ? AND is_current = 1
        ORDER BY id
        "#,
    )
    .bind(scope_id.to_string())
    .bind(gene_id)
    .bind(current_id.to_string())
    .fetch_all(&mut *conn)
    .await?;

    for id in &ids {
        sqlx::query(
            "UPDATE curations SET is_current = 0, lock_version = lock_version + 1 WHERE id = ?",
        )
        .bind(id)
        .execute(&mut *conn)
        .await?;
    }

    sqlx::query("UPDATE curations SET is_current = 1 WHERE id = ?")
        .bind(current_id.to_string())
        .execute(&mut *conn)
        .await?;

    ids.iter()
        .map(|id| gcur_common::uuid_utils::parse_column("id", id))
        .collect()
}
