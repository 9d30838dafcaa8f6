//! Database schema migrations
//!
//! Versioned, idempotent migrations tracked in `schema_version`.
//!
//! # Migration Guidelines
//!
//! 1. **Never modify existing migrations** - stores upgrading from older versions rely on them
//! 2. **Always add new migrations** - one function per schema change
//! 3. **Check before altering** - every migration must be safe to run twice
//! 4. **Use ALTER TABLE** - prefer it over DROP/CREATE to preserve data

use crate::Result;
use sqlx::SqlitePool;
use tracing::{info, warn};

/// Current schema version
///
/// **IMPORTANT:** Increment this when adding new migrations
pub const CURRENT_SCHEMA_VERSION: i32 = 3;

/// Get current schema version from database
///
/// Returns 0 if schema_version table doesn't exist or has no rows
pub async fn get_schema_version(pool: &SqlitePool) -> Result<i32> {
    let table_exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM sqlite_master
            WHERE type='table' AND name='schema_version'
        )
        "#,
    )
    .fetch_one(pool)
    .await?;

    if !table_exists {
        return Ok(0);
    }

    let version: Option<i32> =
        sqlx::query_scalar("SELECT version FROM schema_version ORDER BY version DESC LIMIT 1")
            .fetch_optional(pool)
            .await?;

    Ok(version.unwrap_or(0))
}

async fn set_schema_version(pool: &SqlitePool, version: i32) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;

    Ok(())
}

/// Run all pending migrations
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let current_version = get_schema_version(pool).await?;

    if current_version == CURRENT_SCHEMA_VERSION {
        info!("Database schema is up to date (v{})", current_version);
        return Ok(());
    }

    if current_version > CURRENT_SCHEMA_VERSION {
        warn!(
            "Database schema version ({}) is newer than code version ({})",
            current_version, CURRENT_SCHEMA_VERSION
        );
        return Ok(());
    }

    info!(
        "Running database migrations: v{} -> v{}",
        current_version, CURRENT_SCHEMA_VERSION
    );

    if current_version < 1 {
        migrate_v1(pool).await?;
        set_schema_version(pool, 1).await?;
        info!("Migration v1 completed");
    }

    if current_version < 2 {
        migrate_v2(pool).await?;
        set_schema_version(pool, 2).await?;
        info!("Migration v2 completed");
    }

    if current_version < 3 {
        migrate_v3(pool).await?;
        set_schema_version(pool, 3).await?;
        info!("Migration v3 completed");
    }

    Ok(())
}

/// Migration v1: isolation and uniqueness indexes
///
/// - at most one active membership per (scope, user)
/// - at most one scope-level workflow configuration per scope
/// - at most one workflow configuration per (scope, workflow pair)
/// - lookup indexes used by the scoped read filter
async fn migrate_v1(pool: &SqlitePool) -> Result<()> {
    info!("Running migration v1: isolation and uniqueness indexes");

    let statements = [
        r#"CREATE UNIQUE INDEX IF NOT EXISTS idx_memberships_active_pair
           ON memberships (scope_id, user_id) WHERE is_active = 1"#,
        r#"CREATE INDEX IF NOT EXISTS idx_memberships_user
           ON memberships (user_id, is_active)"#,
        r#"CREATE UNIQUE INDEX IF NOT EXISTS idx_workflow_config_scope
           ON workflow_configurations (scope_id) WHERE workflow_pair IS NULL"#,
        r#"CREATE UNIQUE INDEX IF NOT EXISTS idx_workflow_config_pair
           ON workflow_configurations (scope_id, workflow_pair) WHERE workflow_pair IS NOT NULL"#,
        r#"CREATE INDEX IF NOT EXISTS idx_curations_scope
           ON curations (scope_id, gene_id)"#,
        r#"CREATE INDEX IF NOT EXISTS idx_evidence_items_curation
           ON evidence_items (curation_id)"#,
        r#"CREATE INDEX IF NOT EXISTS idx_audit_events_curation
           ON audit_events (curation_id)"#,
    ];

    for statement in statements {
        sqlx::query(statement).execute(pool).await?;
    }

    Ok(())
}

/// Migration v2: add score_detail column to curations
///
/// **Background:** early stores kept only the total score and label; the
/// per-category breakdown (or the list of validation issues for an
/// incomplete set) is now stored alongside them.
async fn migrate_v2(pool: &SqlitePool) -> Result<()> {
    info!("Running migration v2: Add score_detail column to curations");

    let has_column: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM pragma_table_info('curations') WHERE name = 'score_detail'",
    )
    .fetch_one(pool)
    .await?;

    if has_column > 0 {
        info!("  score_detail column already exists - skipping");
        return Ok(());
    }

    sqlx::query("ALTER TABLE curations ADD COLUMN score_detail TEXT")
        .execute(pool)
        .await?;

    info!("  Added score_detail column to curations table");
    Ok(())
}

/// Migration v3: only finalized curations are current
///
/// **Background:** early stores marked every new draft as current, so a draft
/// and the active record for the same gene both matched current-only queries.
async fn migrate_v3(pool: &SqlitePool) -> Result<()> {
    info!("Running migration v3: Clear is_current on unfinalized curations");

    let columns: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM pragma_table_info('curations') WHERE name IN ('stage', 'is_current')",
    )
    .fetch_one(pool)
    .await?;

    if columns < 2 {
        info!("  curations has no stage/is_current columns - skipping");
        return Ok(());
    }

    let result = sqlx::query("UPDATE curations SET is_current = 0 WHERE stage != 'active' AND is_current = 1")
        .execute(pool)
        .await?;

    info!("  Cleared is_current on {} draft curations", result.rows_affected());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_legacy_db() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();

        sqlx::query(
            "CREATE TABLE schema_version (version INTEGER PRIMARY KEY, applied_at TIMESTAMP)",
        )
        .execute(&pool)
        .await
        .unwrap();

        // Tables as they looked before score_detail existed
        for ddl in [
            "CREATE TABLE memberships (id TEXT PRIMARY KEY, scope_id TEXT, user_id TEXT, is_active INTEGER)",
            "CREATE TABLE workflow_configurations (id TEXT PRIMARY KEY, scope_id TEXT, workflow_pair TEXT)",
            "CREATE TABLE curations (id TEXT PRIMARY KEY, scope_id TEXT, gene_id TEXT, score REAL)",
            "CREATE TABLE evidence_items (id TEXT PRIMARY KEY, curation_id TEXT)",
            "CREATE TABLE audit_events (id INTEGER PRIMARY KEY, curation_id TEXT)",
        ] {
            sqlx::query(ddl).execute(&pool).await.unwrap();
        }

        pool
    }

    #[tokio::test]
    async fn test_migrations_bring_legacy_db_to_current() {
        let pool = setup_legacy_db().await;
        assert_eq!(get_schema_version(&pool).await.unwrap(), 0);

        run_migrations(&pool).await.unwrap();

        assert_eq!(
            get_schema_version(&pool).await.unwrap(),
            CURRENT_SCHEMA_VERSION
        );
        let has_column: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM pragma_table_info('curations') WHERE name = 'score_detail'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(has_column, 1);
    }

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let pool = setup_legacy_db().await;
        run_migrations(&pool).await.unwrap();
        run_migrations(&pool).await.unwrap();
        assert_eq!(
            get_schema_version(&pool).await.unwrap(),
            CURRENT_SCHEMA_VERSION
        );
    }

    #[tokio::test]
    async fn test_v3_clears_current_flag_on_drafts() {
        let pool = setup_legacy_db().await;
        sqlx::query("DROP TABLE curations").execute(&pool).await.unwrap();
        sqlx::query(
            "CREATE TABLE curations (id TEXT PRIMARY KEY, scope_id TEXT, gene_id TEXT, stage TEXT, is_current INTEGER, score REAL)",
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO curations VALUES ('c1', 's1', 'HGNC:1', 'active', 1, NULL), ('c2', 's1', 'HGNC:1', 'entry', 1, NULL)",
        )
        .execute(&pool)
        .await
        .unwrap();

        run_migrations(&pool).await.unwrap();

        let current: Vec<String> =
            sqlx::query_scalar("SELECT id FROM curations WHERE is_current = 1 ORDER BY id")
                .fetch_all(&pool)
                .await
                .unwrap();
        assert_eq!(current, vec!["c1".to_string()]);
    }

    #[tokio::test]
    async fn test_active_membership_index_rejects_duplicates() {
        let pool = setup_legacy_db().await;
        run_migrations(&pool).await.unwrap();

        sqlx::query("INSERT INTO memberships VALUES ('m1', 's1', 'u1', 1)")
            .execute(&pool)
            .await
            .unwrap();
        // A deactivated duplicate is fine
        sqlx::query("INSERT INTO memberships VALUES ('m0', 's1', 'u1', 0)")
            .execute(&pool)
            .await
            .unwrap();
        let duplicate = sqlx::query("INSERT INTO memberships VALUES ('m2', 's1', 'u1', 1)")
            .execute(&pool)
            .await;
        assert!(duplicate.is_err());
    }
}
