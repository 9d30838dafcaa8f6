//! Membership rows
//!
//! At most one active row per (scope, user) is enforced by a partial unique
//! index; deactivated rows stay behind as history.

use super::{enum_col, opt_time_col, opt_uuid_col, time_col, uuid_col};
use gcur_common::{Membership, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

const COLUMNS: &str = "id, scope_id, user_id, role, invited_by, invited_at, accepted_at, is_active, deactivated_at";

fn from_row(row: &SqliteRow) -> Result<Membership> {
    Ok(Membership {
        id: uuid_col(row, "id")?,
        scope_id: uuid_col(row, "scope_id")?,
        user_id: uuid_col(row, "user_id")?,
        role: enum_col(row, "role")?,
        invited_by: opt_uuid_col(row, "invited_by")?,
        invited_at: time_col(row, "invited_at")?,
        accepted_at: opt_time_col(row, "accepted_at")?,
        is_active: row.try_get("is_active")?,
        deactivated_at: opt_time_col(row, "deactivated_at")?,
    })
}

pub(crate) async fn insert(conn: &mut SqliteConnection, membership: &Membership) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO memberships
            (id, scope_id, user_id, role, invited_by, invited_at, accepted_at, is_active, deactivated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(membership.id.to_string())
    .bind(membership.scope_id.to_string())
    .bind(membership.user_id.to_string())
    .bind(membership.role.as_str())
    .bind(membership.invited_by.map(|id| id.to_string()))
    .bind(gcur_common::time::to_db(&membership.invited_at))
    .bind(membership.accepted_at.as_ref().map(gcur_common::time::to_db))
    .bind(membership.is_active)
    .bind(membership.deactivated_at.as_ref().map(gcur_common::time::to_db))
    .execute(conn)
    .await?;
    Ok(())
}

/// The live (active, possibly pending) membership for (scope, user)
pub(crate) async fn active_for(
    conn: &mut SqliteConnection,
    scope_id: Uuid,
    user_id: Uuid,
) -> Result<Option<Membership>> {
    let sql = format!(
        "SELECT {} FROM memberships WHERE scope_id = ? AND user_id = ? AND is_active = 1",
        COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(scope_id.to_string())
        .bind(user_id.to_string())
        .fetch_optional(conn)
        .await?;
    row.as_ref().map(from_row).transpose()
}

/// Scopes where the user holds an accepted, active membership
pub(crate) async fn granted_scope_ids(
    conn: &mut SqliteConnection,
    user_id: Uuid,
) -> Result<Vec<Uuid>> {
    let rows: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT scope_id FROM memberships
        WHERE user_id = ? AND is_active = 1 AND accepted_at IS NOT NULL
        ORDER BY scope_id
        "#,
    )
    .bind(user_id.to_string())
    .fetch_all(conn)
    .await?;

    rows.iter()
        .map(|id| gcur_common::uuid_utils::parse_column("scope_id", id))
        .collect()
}

pub(crate) async fn list_for_scope(
    conn: &mut SqliteConnection,
    scope_id: Uuid,
    include_inactive: bool,
) -> Result<Vec<Membership>> {
    let sql = format!(
        "SELECT {} FROM memberships WHERE scope_id = ? {} ORDER BY invited_at, id",
        COLUMNS,
        if include_inactive { "" } else { "AND is_active = 1" }
    );
    let rows = sqlx::query(&sql)
        .bind(scope_id.to_string())
        .fetch_all(conn)
        .await?;
    rows.iter().map(from_row).collect()
}

pub(crate) async fn mark_accepted(conn: &mut SqliteConnection, membership_id: Uuid) -> Result<()> {
    sqlx::query("UPDATE memberships SET accepted_at = ? WHERE id = ? AND accepted_at IS NULL")
        .bind(gcur_common::time::to_db(&gcur_common::time::now()))
        .bind(membership_id.to_string())
        .execute(conn)
        .await?;
    Ok(())
}

pub(crate) async fn deactivate(conn: &mut SqliteConnection, membership_id: Uuid) -> Result<()> {
    sqlx::query("UPDATE memberships SET is_active = 0, deactivated_at = ? WHERE id = ?")
        .bind(gcur_common::time::to_db(&gcur_common::time::now()))
        .bind(membership_id.to_string())
        .execute(conn)
        .await?;
    Ok(())
}
