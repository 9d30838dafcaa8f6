//! Review sign-offs per review round

use gcur_common::Result;
use sqlx::SqliteConnection;
use uuid::Uuid;

/// Record a sign-off; repeating it in the same round is a no-op
pub(crate) async fn record(
    conn: &mut SqliteConnection,
    curation_id: Uuid,
    review_round: i64,
    reviewer_id: Uuid,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT OR IGNORE INTO review_approvals (curation_id, review_round, reviewer_id, approved_at)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(curation_id.to_string())
    .bind(review_round)
    .bind(reviewer_id.to_string())
    .bind(gcur_common::time::to_db(&gcur_common::time::now()))
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Distinct reviewers who signed off in the given round
pub(crate) async fn reviewers(
    conn: &mut SqliteConnection,
    curation_id: Uuid,
    review_round: i64,
) -> Result<Vec<Uuid>> {
    let ids: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT reviewer_id FROM review_approvals
        WHERE curation_id = ? AND review_round = ?
        ORDER BY approved_at, reviewer_id
        "#,
    )
    .bind(curation_id.to_string())
    .bind(review_round)
    .fetch_all(conn)
    .await?;

    ids.iter()
        .map(|id| gcur_common::uuid_utils::parse_column("reviewer_id", id))
        .collect()
}
