use serde::{Deserialize, Serialize};

/// Read-only view of a memory record owned by the primary memory store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub content_hash: String,
    pub content: String,
    pub memory_type: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: f64,
    #[serde(default)]
    pub deleted_at: Option<f64>,
}

impl MemoryRecord {
    pub fn new(content_hash: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            content_hash: content_hash.into(),
            content: content.into(),
            memory_type: None,
            tags: Vec::new(),
            created_at: crate::now_epoch_seconds(),
            deleted_at: None,
        }
    }

    pub fn with_type(mut self, memory_type: impl Into<String>) -> Self {
        self.memory_type = Some(memory_type.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_created_at(mut self, created_at: f64) -> Self {
        self.created_at = created_at;
        self
    }

    /// Soft-deleted records stay in the store but are hidden from presentation.
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}
