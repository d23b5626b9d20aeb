//! Schema version management for pre-v1 development.
//!
//! Pre-v1 has no data to preserve, so on version mismatch we simply
//! drop all known tables and let the `CREATE TABLE` statements below
//! recreate them.

use sqlx::{Pool, Sqlite};
use tracing::warn;

use crate::error::Result;

/// Current schema version. Increment when a table's shape changes.
pub const SCHEMA_VERSION: i64 = 1;

const KNOWN_TABLES: &[&str] = &["task_results", "package_files", "tasks", "packages"];

/// Ensures the schema exists at [`SCHEMA_VERSION`], dropping and recreating
/// known tables if an older version is found.
pub async fn ensure_schema(pool: &Pool<Sqlite>) -> Result<()> {
    sqlx::query("PRAGMA journal_mode=WAL").execute(pool).await?;
    sqlx::query("PRAGMA synchronous=NORMAL").execute(pool).await?;
    sqlx::query("PRAGMA foreign_keys=ON").execute(pool).await?;

    sqlx::query("CREATE TABLE IF NOT EXISTS mrtaskman_meta (key TEXT PRIMARY KEY, schema_version INTEGER NOT NULL)")
        .execute(pool)
        .await?;

    let current: Option<i64> = sqlx::query_scalar(
        "SELECT schema_version FROM mrtaskman_meta WHERE key = 'schema'",
    )
    .fetch_optional(pool)
    .await?;

    if let Some(version) = current {
        if version != SCHEMA_VERSION {
            warn!(from = version, to = SCHEMA_VERSION, "resetting scheduler schema (dev mode)");
            for table in KNOWN_TABLES {
                sqlx::query(&format!("DROP TABLE IF EXISTS {table}"))
                    .execute(pool)
                    .await?;
            }
        }
    }

    create_tables(pool).await?;

    sqlx::query(
        r#"
        INSERT INTO mrtaskman_meta (key, schema_version) VALUES ('schema', ?)
        ON CONFLICT(key) DO UPDATE SET schema_version = excluded.schema_version
        "#,
    )
    .bind(SCHEMA_VERSION)
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_tables(pool: &Pool<Sqlite>) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tasks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            config TEXT NOT NULL,
            scheduled_by TEXT,
            scheduled_time TEXT NOT NULL,
            state TEXT NOT NULL,
            attempts INTEGER NOT NULL DEFAULT 0,
            max_attempts INTEGER NOT NULL DEFAULT 3,
            executor_requirements TEXT NOT NULL,
            priority INTEGER NOT NULL DEFAULT 0,
            assigned_time TEXT,
            assigned_worker TEXT,
            completed_time TEXT,
            outcome TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_tasks_state_priority ON tasks(state, priority DESC, id ASC)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS task_results (
            task_id INTEGER NOT NULL,
            attempt INTEGER NOT NULL,
            exit_code INTEGER NOT NULL,
            execution_time REAL NOT NULL,
            stdout_ref TEXT,
            stderr_ref TEXT,
            stdout_url TEXT,
            stderr_url TEXT NOT NULL,
            device_serial_number TEXT,
            result_metadata TEXT,
            PRIMARY KEY (task_id, attempt)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS packages (
            name TEXT NOT NULL,
            version INTEGER NOT NULL,
            created_by TEXT,
            created_time TEXT NOT NULL,
            modified_time TEXT NOT NULL,
            PRIMARY KEY (name, version)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS package_files (
            name TEXT NOT NULL,
            version INTEGER NOT NULL,
            destination_path TEXT NOT NULL,
            file_mode TEXT NOT NULL,
            download_url TEXT,
            blob_ref TEXT,
            PRIMARY KEY (name, version, destination_path),
            FOREIGN KEY (name, version) REFERENCES packages(name, version) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    #[tokio::test]
    async fn fresh_database_records_current_version() {
        let pool = SqlitePoolOptions::new().connect(":memory:").await.unwrap();
        ensure_schema(&pool).await.unwrap();

        let version: i64 = sqlx::query_scalar("SELECT schema_version FROM mrtaskman_meta WHERE key = 'schema'")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[tokio::test]
    async fn version_mismatch_drops_known_tables() {
        let pool = SqlitePoolOptions::new().connect(":memory:").await.unwrap();
        ensure_schema(&pool).await.unwrap();
        sqlx::query("INSERT INTO tasks (name, config, scheduled_time, state, executor_requirements) VALUES ('t', '{}', '2024-01-01T00:00:00Z', 'scheduled', '[\"macos\"]')")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("UPDATE mrtaskman_meta SET schema_version = 0 WHERE key = 'schema'")
            .execute(&pool)
            .await
            .unwrap();

        ensure_schema(&pool).await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tasks")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }
}
