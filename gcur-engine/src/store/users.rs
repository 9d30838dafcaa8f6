//! User directory rows (identity lookup: user id -> application role)

use super::{enum_col, time_col, uuid_col};
use gcur_common::models::User;
use gcur_common::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::SqliteConnection;
use uuid::Uuid;

fn from_row(row: &SqliteRow) -> Result<User> {
    Ok(User {
        id: uuid_col(row, "id")?,
        username: sqlx::Row::try_get(row, "username")?,
        role: enum_col(row, "app_role")?,
        created_at: time_col(row, "created_at")?,
    })
}

pub(crate) async fn insert(conn: &mut SqliteConnection, user: &User) -> Result<()> {
    sqlx::query("INSERT INTO users (id, username, app_role, created_at) VALUES (?, ?, ?, ?)")
        .bind(user.id.to_string())
        .bind(&user.username)
        .bind(user.role.as_str())
        .bind(gcur_common::time::to_db(&user.created_at))
        .execute(conn)
        .await?;
    Ok(())
}

pub(crate) async fn load(conn: &mut SqliteConnection, user_id: Uuid) -> Result<Option<User>> {
    let row = sqlx::query("SELECT id, username, app_role, created_at FROM users WHERE id = ?")
        .bind(user_id.to_string())
        .fetch_optional(conn)
        .await?;
    row.as_ref().map(from_row).transpose()
}

pub(crate) async fn count(conn: &mut SqliteConnection) -> Result<i64> {
    Ok(sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(conn)
        .await?)
}

pub(crate) async fn username_taken(conn: &mut SqliteConnection, username: &str) -> Result<bool> {
    Ok(
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE username = ?)")
            .bind(username)
            .fetch_one(conn)
            .await?,
    )
}

