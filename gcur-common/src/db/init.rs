//! Database initialisation
//!
//! Creates the SQLite store on first run and brings an existing one up to
//! date. Table creation is idempotent (`CREATE TABLE IF NOT EXISTS`); schema
//! changes after the initial layout go through `migrations.rs`.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Busy timeout applied to every pooled connection
///
/// Writers serialise on SQLite's database lock; a waiting writer gives up
/// after this long and the caller sees a database error instead of blocking
/// indefinitely.
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Pragmas set through connect options apply to every pooled connection,
    // not only the one that happened to run a PRAGMA statement.
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT);

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;
    Ok(pool)
}

/// Private in-memory store for tests and preview tooling
///
/// Limited to a single connection: every connection to `sqlite::memory:`
/// opens its own empty database.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?
        .foreign_keys(true)
        .busy_timeout(BUSY_TIMEOUT);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    create_schema(&pool).await?;
    Ok(pool)
}

/// Create all tables and run pending migrations
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;
    create_users_table(pool).await?;
    create_scopes_table(pool).await?;
    create_memberships_table(pool).await?;
    create_curations_table(pool).await?;
    create_evidence_items_table(pool).await?;
    create_review_approvals_table(pool).await?;
    create_workflow_configurations_table(pool).await?;
    create_scoring_configurations_table(pool).await?;
    create_audit_events_table(pool).await?;

    crate::db::migrations::run_migrations(pool).await?;
    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_users_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            app_role TEXT NOT NULL CHECK (app_role IN ('admin', 'user')),
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_scopes_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS scopes (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            visibility TEXT NOT NULL CHECK (visibility IN ('public', 'private')),
            is_active INTEGER NOT NULL DEFAULT 1,
            created_by TEXT REFERENCES users(id),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Memberships: `accepted_at IS NULL` means the invitation is pending
async fn create_memberships_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS memberships (
            id TEXT PRIMARY KEY,
            scope_id TEXT NOT NULL REFERENCES scopes(id) ON DELETE CASCADE,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            role TEXT NOT NULL CHECK (role IN ('admin', 'curator', 'reviewer', 'viewer')),
            invited_by TEXT REFERENCES users(id),
            invited_at TEXT NOT NULL,
            accepted_at TEXT,
            is_active INTEGER NOT NULL DEFAULT 1,
            deactivated_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_curations_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS curations (
            id TEXT PRIMARY KEY,
            scope_id TEXT NOT NULL REFERENCES scopes(id),
            gene_id TEXT NOT NULL,
            workflow_pair TEXT,
            schema_id TEXT,
            creator_id TEXT NOT NULL REFERENCES users(id),
            stage TEXT NOT NULL,
            lock_version INTEGER NOT NULL DEFAULT 1,
            is_current INTEGER NOT NULL DEFAULT 0,
            evidence_frozen INTEGER NOT NULL DEFAULT 0,
            review_round INTEGER NOT NULL DEFAULT 0,
            score REAL,
            classification TEXT,
            score_status TEXT NOT NULL DEFAULT 'pending',
            score_detail TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Evidence items: `payload` is the category-tagged JSON, `contribution` the
/// derived per-item score
async fn create_evidence_items_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS evidence_items (
            id TEXT PRIMARY KEY,
            curation_id TEXT NOT NULL REFERENCES curations(id) ON DELETE CASCADE,
            category TEXT NOT NULL,
            payload TEXT NOT NULL,
            contribution TEXT,
            created_by TEXT NOT NULL REFERENCES users(id),
            created_at TEXT NOT NULL,
            updated_by TEXT NOT NULL REFERENCES users(id),
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_review_approvals_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS review_approvals (
            curation_id TEXT NOT NULL REFERENCES curations(id) ON DELETE CASCADE,
            review_round INTEGER NOT NULL,
            reviewer_id TEXT NOT NULL REFERENCES users(id),
            approved_at TEXT NOT NULL,
            PRIMARY KEY (curation_id, review_round, reviewer_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Workflow configurations: `workflow_pair IS NULL` is the scope-level row
async fn create_workflow_configurations_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS workflow_configurations (
            id TEXT PRIMARY KEY,
            scope_id TEXT NOT NULL REFERENCES scopes(id) ON DELETE CASCADE,
            workflow_pair TEXT,
            policy TEXT NOT NULL,
            updated_by TEXT REFERENCES users(id),
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_scoring_configurations_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS scoring_configurations (
            schema_id TEXT PRIMARY KEY,
            config TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_audit_events_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS audit_events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            scope_id TEXT NOT NULL,
            curation_id TEXT,
            event_type TEXT NOT NULL,
            actor_id TEXT,
            payload TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
