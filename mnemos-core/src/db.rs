use crate::config::DatabaseConfig;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Current schema version.
pub const SCHEMA_VERSION: i64 = 1;

/// Open the graph database described by `config` and make sure the schema exists.
///
/// In-memory databases are pinned to a single connection that is never recycled,
/// otherwise every new connection would see its own empty database.
pub async fn create_pool(config: &DatabaseConfig) -> Result<SqlitePool, sqlx::Error> {
    let busy_timeout = Duration::from_millis(config.busy_timeout_ms);

    let pool = if config.is_in_memory() {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?
            .busy_timeout(busy_timeout)
            .foreign_keys(true);
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?
    } else {
        let path = config.expanded_path();
        if let Some(parent) = Path::new(&path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(busy_timeout)
            .foreign_keys(true);
        SqlitePoolOptions::new()
            .max_connections(config.max_connections.max(1))
            .connect_with(options)
            .await?
    };

    initialize_schema(&pool).await?;
    Ok(pool)
}

/// Create tables and indexes if they are missing. Safe to call repeatedly.
pub async fn initialize_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    let current: i64 = sqlx::query_scalar("SELECT COALESCE(MAX(version), 0) FROM schema_version")
        .fetch_one(pool)
        .await?;

    if current < 1 {
        apply_v1_schema(pool).await?;
        tracing::info!(version = SCHEMA_VERSION, "Graph schema initialized");
    }

    Ok(())
}

async fn apply_v1_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    // Directed association rows. Symmetric relationships occupy two rows.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS memory_graph (
            source_hash TEXT NOT NULL,
            target_hash TEXT NOT NULL,
            similarity REAL NOT NULL,
            connection_types TEXT NOT NULL DEFAULT '[]',
            metadata TEXT,
            created_at REAL NOT NULL,
            relationship_type TEXT,
            PRIMARY KEY (source_hash, target_hash)
        )
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_graph_source ON memory_graph(source_hash)")
        .execute(&mut *tx)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_graph_target ON memory_graph(target_hash)")
        .execute(&mut *tx)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_graph_relationship ON memory_graph(relationship_type)",
    )
    .execute(&mut *tx)
    .await?;

    // Memory records owned by the primary store; the graph core only reads them.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS memories (
            content_hash TEXT PRIMARY KEY,
            content TEXT NOT NULL,
            memory_type TEXT,
            tags TEXT NOT NULL DEFAULT '[]',
            created_at REAL NOT NULL,
            deleted_at REAL
        )
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
        .bind(SCHEMA_VERSION)
        .execute(&mut *tx)
        .await?;

    tx.commit().await
}

/// Get the current schema version.
pub async fn schema_version(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COALESCE(MAX(version), 0) FROM schema_version")
        .fetch_one(pool)
        .await
}

pub async fn health_check(pool: &SqlitePool) -> Result<String, sqlx::Error> {
    let row: (String,) = sqlx::query_as("SELECT sqlite_version()")
        .fetch_one(pool)
        .await?;
    Ok(row.0)
}
