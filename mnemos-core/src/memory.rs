//! Read access to memory records owned by the primary memory store.
//!
//! The graph never owns memory content. Anything that needs content, type or
//! tags (visualization, concept abstraction, auto-linking) goes through
//! [`MemoryLookup`]. [`SqliteMemoryCatalog`] is the bundled implementation
//! over the `memories` table in the same database file.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::error::{MnemosError, Result};
use crate::models::MemoryRecord;
use crate::ontology::validate_memory_type;

const IN_CHUNK: usize = 400;

#[async_trait]
pub trait MemoryLookup: Send + Sync {
    /// Fetch one record, soft-deleted ones included.
    async fn get_memory(&self, content_hash: &str) -> Result<Option<MemoryRecord>>;

    /// Fetch many records keyed by hash. Missing hashes are simply absent.
    async fn get_memories(&self, hashes: &[String]) -> Result<HashMap<String, MemoryRecord>> {
        let mut found = HashMap::with_capacity(hashes.len());
        for hash in hashes {
            if let Some(record) = self.get_memory(hash).await? {
                found.insert(hash.clone(), record);
            }
        }
        Ok(found)
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MemoryRow {
    content_hash: String,
    content: String,
    memory_type: Option<String>,
    tags: Option<String>,
    created_at: f64,
    deleted_at: Option<f64>,
}

impl TryFrom<MemoryRow> for MemoryRecord {
    type Error = MnemosError;

    fn try_from(row: MemoryRow) -> Result<Self> {
        let tags = match row.tags.as_deref() {
            None | Some("") => Vec::new(),
            Some(raw) => serde_json::from_str(raw)?,
        };
        Ok(MemoryRecord {
            content_hash: row.content_hash,
            content: row.content,
            memory_type: row.memory_type.filter(|t| !t.is_empty()),
            tags,
            created_at: row.created_at,
            deleted_at: row.deleted_at,
        })
    }
}

#[derive(Clone)]
pub struct SqliteMemoryCatalog {
    pool: SqlitePool,
}

impl SqliteMemoryCatalog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or replace a record. A replaced record is un-deleted.
    /// The memory type, when present, must be known to the ontology.
    pub async fn insert_memory(&self, record: &MemoryRecord) -> Result<()> {
        if record.content_hash.trim().is_empty() {
            return Err(MnemosError::InvalidInput(
                "memory content_hash must not be empty".to_string(),
            ));
        }
        if let Some(memory_type) = record.memory_type.as_deref() {
            if !validate_memory_type(memory_type) {
                return Err(MnemosError::UnknownMemoryType(memory_type.to_string()));
            }
        }
        let tags = serde_json::to_string(&record.tags)?;

        sqlx::query(
            r#"
            INSERT INTO memories (content_hash, content, memory_type, tags, created_at, deleted_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT (content_hash)
            DO UPDATE SET
                content = excluded.content,
                memory_type = excluded.memory_type,
                tags = excluded.tags,
                created_at = excluded.created_at,
                deleted_at = excluded.deleted_at
            "#,
        )
        .bind(&record.content_hash)
        .bind(&record.content)
        .bind(record.memory_type.as_deref())
        .bind(&tags)
        .bind(record.created_at)
        .bind(record.deleted_at)
        .execute(&self.pool)
        .await?;

        tracing::debug!(hash = %record.content_hash, "Stored memory record");
        Ok(())
    }

    /// Mark a record deleted. Returns `false` if it was unknown or already deleted.
    pub async fn soft_delete(&self, content_hash: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE memories SET deleted_at = ? WHERE content_hash = ? AND deleted_at IS NULL",
        )
        .bind(crate::now_epoch_seconds())
        .bind(content_hash)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn count(&self) -> Result<u64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM memories WHERE deleted_at IS NULL")
                .fetch_one(&self.pool)
                .await?;
        Ok(count.max(0) as u64)
    }
}

#[async_trait]
impl MemoryLookup for SqliteMemoryCatalog {
    async fn get_memory(&self, content_hash: &str) -> Result<Option<MemoryRecord>> {
        let row = sqlx::query_as::<_, MemoryRow>(
            r#"
            SELECT content_hash, content, memory_type, tags, created_at, deleted_at
            FROM memories
            WHERE content_hash = ?
            "#,
        )
        .bind(content_hash)
        .fetch_optional(&self.pool)
        .await?;
        row.map(MemoryRecord::try_from).transpose()
    }

    async fn get_memories(&self, hashes: &[String]) -> Result<HashMap<String, MemoryRecord>> {
        let mut found = HashMap::with_capacity(hashes.len());
        for chunk in hashes.chunks(IN_CHUNK) {
            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
                "SELECT content_hash, content, memory_type, tags, created_at, deleted_at FROM memories WHERE content_hash IN (",
            );
            let mut separated = qb.separated(", ");
            for hash in chunk {
                separated.push_bind(hash.as_str());
            }
            separated.push_unseparated(")");

            let rows: Vec<MemoryRow> = qb.build_query_as().fetch_all(&self.pool).await?;
            for row in rows {
                let record = MemoryRecord::try_from(row)?;
                found.insert(record.content_hash.clone(), record);
            }
        }
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::db;

    async fn catalog() -> SqliteMemoryCatalog {
        let pool = db::create_pool(&DatabaseConfig::in_memory()).await.unwrap();
        SqliteMemoryCatalog::new(pool)
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let catalog = catalog().await;
        let record = MemoryRecord::new("h1", "Null pointer in parser")
            .with_type("error")
            .with_tags(["parser", "crash"]);
        catalog.insert_memory(&record).await.unwrap();

        let fetched = catalog.get_memory("h1").await.unwrap().unwrap();
        assert_eq!(fetched.content, "Null pointer in parser");
        assert_eq!(fetched.memory_type.as_deref(), Some("error"));
        assert_eq!(fetched.tags, vec!["parser", "crash"]);
        assert!(catalog.get_memory("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_memories_skips_missing() {
        let catalog = catalog().await;
        for hash in ["a", "b"] {
            catalog
                .insert_memory(&MemoryRecord::new(hash, format!("content {}", hash)))
                .await
                .unwrap();
        }
        let found = catalog
            .get_memories(&["a".to_string(), "b".to_string(), "zzz".to_string()])
            .await
            .unwrap();
        assert_eq!(found.len(), 2);
        assert!(found.contains_key("a"));
        assert!(!found.contains_key("zzz"));
    }

    #[tokio::test]
    async fn test_soft_delete() {
        let catalog = catalog().await;
        catalog
            .insert_memory(&MemoryRecord::new("a", "content"))
            .await
            .unwrap();

        assert!(catalog.soft_delete("a").await.unwrap());
        assert!(!catalog.soft_delete("a").await.unwrap());
        assert!(catalog.get_memory("a").await.unwrap().unwrap().is_deleted());
        assert_eq!(catalog.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unknown_memory_type_rejected() {
        let catalog = catalog().await;
        let record = MemoryRecord::new("h", "content").with_type("gossip");
        let result = catalog.insert_memory(&record).await;
        assert!(matches!(result, Err(MnemosError::UnknownMemoryType(t)) if t == "gossip"));

        let qualified = MemoryRecord::new("h2", "content").with_type("decision/architecture");
        catalog.insert_memory(&qualified).await.unwrap();
    }

    #[tokio::test]
    async fn test_empty_hash_rejected() {
        let catalog = catalog().await;
        let result = catalog.insert_memory(&MemoryRecord::new(" ", "content")).await;
        assert!(matches!(result, Err(MnemosError::InvalidInput(_))));
    }
}
