pub mod config;
pub mod db;
pub mod error;
pub mod graph;
pub mod inference;
pub mod linker;
pub mod memory;
pub mod models;
pub mod ontology;
pub mod reasoning;

pub use config::MnemosConfig;
pub use error::{MnemosError, Result};
pub use graph::GraphStorage;
pub use inference::{Inference, RelationshipInferenceEngine, SignalStrategy};
pub use linker::{link_memory, LinkReport};
pub use memory::{MemoryLookup, SqliteMemoryCatalog};
pub use ontology::RelationshipType;
pub use reasoning::{SemanticReasoner, Suggestion};

/// Current wall-clock time as fractional Unix seconds.
pub fn now_epoch_seconds() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}
