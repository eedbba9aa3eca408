//! Linker: automatic typed link creation
//!
//! Wires the inference engine to graph storage for a freshly stored memory:
//! - Candidates come with an externally computed similarity (vector search)
//! - Candidates below `linker.min_similarity` are skipped
//! - The inference engine picks the relationship type; ambiguous pairs fall
//!   back to `related`
//! - The association is upserted, so re-linking the same memory is idempotent

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::LinkerConfig;
use crate::error::Result;
use crate::graph::GraphStorage;
use crate::inference::RelationshipInferenceEngine;
use crate::models::MemoryRecord;
use crate::ontology::RelationshipType;

/// Outcome of one linking pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkReport {
    pub considered: usize,
    /// Associations written, typed and `related` alike.
    pub linked: usize,
    /// Associations written with a type other than `related`.
    pub typed: usize,
    pub skipped: usize,
}

/// Link `source` to each candidate that clears the similarity floor
///
/// # Arguments
/// * `storage` - Graph storage to write into
/// * `engine` - Relationship classifier
/// * `config` - Similarity floor and connection-type tag
/// * `source` - The new memory
/// * `candidates` - Existing memories paired with their similarity to `source`
///
/// # Returns
/// * `Ok(LinkReport)` - Counts of written and skipped candidates
/// * `Err` - On database errors
pub async fn link_memory(
    storage: &GraphStorage,
    engine: &RelationshipInferenceEngine,
    config: &LinkerConfig,
    source: &MemoryRecord,
    candidates: &[(MemoryRecord, f64)],
) -> Result<LinkReport> {
    let mut report = LinkReport::default();
    let connection_types = vec![config.connection_type.clone()];

    for (target, similarity) in candidates {
        report.considered += 1;

        if target.content_hash == source.content_hash
            || target.is_deleted()
            || !similarity.is_finite()
            || *similarity < config.min_similarity
        {
            report.skipped += 1;
            continue;
        }

        let inference = engine.infer(source, target);
        let mut metadata = Map::new();
        metadata.insert("confidence".to_string(), Value::from(inference.confidence));
        metadata.insert(
            "signals".to_string(),
            serde_json::to_value(&inference.contributions)?,
        );

        let stored = storage
            .store_association(
                &source.content_hash,
                &target.content_hash,
                *similarity,
                &connection_types,
                Some(&metadata),
                Some(inference.relationship_type),
            )
            .await?;

        if stored {
            report.linked += 1;
            if inference.relationship_type != RelationshipType::Related {
                report.typed += 1;
            }
            tracing::debug!(
                source = %source.content_hash,
                target = %target.content_hash,
                relationship = inference.relationship_type.as_str(),
                confidence = inference.confidence,
                "Linked memory"
            );
        } else {
            report.skipped += 1;
        }
    }

    if report.linked > 0 {
        tracing::info!(
            source = %source.content_hash,
            links = report.linked,
            typed = report.typed,
            "Created graph links for new memory"
        );
    }

    Ok(report)
}

// ============================================================================
// TESTS
// ============================================================================
