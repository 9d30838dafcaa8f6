//! Scope rows

use super::{enum_col, time_col, uuid_col};
use gcur_common::{Result, Scope, Visibility};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

fn from_row(row: &SqliteRow) -> Result<Scope> {
    Ok(Scope {
        id: uuid_col(row, "id")?,
        name: row.try_get("name")?,
        visibility: enum_col(row, "visibility")?,
        is_active: row.try_get("is_active")?,
        created_at: time_col(row, "created_at")?,
    })
}

pub(crate) async fn insert(
    conn: &mut SqliteConnection,
    scope: &Scope,
    created_by: Uuid,
) -> Result<()> {
    let now = gcur_common::time::to_db(&scope.created_at);
    sqlx::query(
        r#"
        INSERT INTO scopes (id, name, visibility, is_active, created_by, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(scope.id.to_string())
    .bind(&scope.name)
    .bind(scope.visibility.as_str())
    .bind(scope.is_active)
    .bind(created_by.to_string())
    .bind(&now)
    .bind(&now)
    .execute(conn)
    .await?;
    Ok(())
}

pub(crate) async fn load(conn: &mut SqliteConnection, scope_id: Uuid) -> Result<Option<Scope>> {
    let row = sqlx::query(
        "SELECT id, name, visibility, is_active, created_at FROM scopes WHERE id = ?",
    )
    .bind(scope_id.to_string())
    .fetch_optional(conn)
    .await?;
    row.as_ref().map(from_row).transpose()
}

pub(crate) async fn name_taken(conn: &mut SqliteConnection, name: &str) -> Result<bool> {
    Ok(
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM scopes WHERE name = ?)")
            .bind(name)
            .fetch_one(conn)
            .await?,
    )
}

pub(crate) async fn update_flags(
    conn: &mut SqliteConnection,
    scope_id: Uuid,
    visibility: Visibility,
    is_active: bool,
) -> Result<()> {
    sqlx::query("UPDATE scopes SET visibility = ?, is_active = ?, updated_at = ? WHERE id = ?")
        .bind(visibility.as_str())
        .bind(is_active)
        .bind(gcur_common::time::to_db(&gcur_common::time::now()))
        .bind(scope_id.to_string())
        .execute(conn)
        .await?;
    Ok(())
}
