//! Semantic reasoning over the typed graph
//!
//! Read-only causal and contradiction queries built from `GraphStorage`
//! primitives. Storage failures are logged and degrade to an empty answer,
//! so callers on a request path never fail because of a graph read.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::graph::GraphStorage;
use crate::memory::MemoryLookup;
use crate::models::{ConnectedMemory, Direction};
use crate::ontology::RelationshipType;

/// A memory two hops away that is not yet linked directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub hash: String,
    /// Intermediate memory on the strongest two-hop path.
    pub via: String,
    /// Product of the similarities along that path.
    pub score: f64,
}

/// A relationship implied by a chain of same-typed edges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitiveInference {
    pub source: String,
    pub target: String,
    pub relationship_type: RelationshipType,
    pub distance: u32,
}

#[derive(Clone)]
pub struct SemanticReasoner {
    storage: GraphStorage,
    lookup: Option<Arc<dyn MemoryLookup>>,
}

impl SemanticReasoner {
    pub fn new(storage: GraphStorage) -> Self {
        Self {
            storage,
            lookup: None,
        }
    }

    /// Attach a memory lookup; required by `abstract_to_concept`.
    pub fn with_lookup(mut self, lookup: Arc<dyn MemoryLookup>) -> Self {
        self.lookup = Some(lookup);
        self
    }

    /// Memories directly linked to `hash` by `contradicts`.
    pub async fn detect_contradictions(&self, hash: &str) -> Vec<String> {
        let result = self
            .neighbours(hash, RelationshipType::Contradicts, Direction::Both)
            .await;
        or_empty("detect_contradictions", hash, result)
    }

    /// Memories with a `fixes` edge pointing at `error_hash`.
    pub async fn find_fixes(&self, error_hash: &str) -> Vec<String> {
        let result = self
            .neighbours(error_hash, RelationshipType::Fixes, Direction::Incoming)
            .await;
        or_empty("find_fixes", error_hash, result)
    }

    /// Memories with a `causes` edge pointing at `effect_hash`.
    pub async fn find_causes(&self, effect_hash: &str) -> Vec<String> {
        let result = self
            .neighbours(effect_hash, RelationshipType::Causes, Direction::Incoming)
            .await;
        or_empty("find_causes", effect_hash, result)
    }

    /// Walk `causes` edges backwards from an effect. Each cause is reported
    /// once, at the shortest distance it was found.
    pub async fn find_causal_chain(&self, effect_hash: &str, max_hops: u32) -> Vec<ConnectedMemory> {
        let result = self
            .storage
            .find_connected(
                effect_hash,
                max_hops,
                Some(RelationshipType::Causes),
                Direction::Incoming,
            )
            .await
            .map(shortest_distances);
        or_empty("find_causal_chain", effect_hash, result)
    }

    /// The tag most often shared between a memory and its direct neighbours.
    /// Ties go to the alphabetically first tag.
    pub async fn abstract_to_concept(&self, hash: &str) -> Option<String> {
        let Some(lookup) = self.lookup.as_ref() else {
            tracing::warn!(hash = %hash, "abstract_to_concept requires a memory lookup");
            return None;
        };
        let result = self.shared_tag(lookup.as_ref(), hash).await;
        or_empty("abstract_to_concept", hash, result)
    }

    /// Pairs linked by a chain of `relationship_type` edges (2..=max_hops long)
    /// but not by a direct edge of that type.
    pub async fn infer_transitive(
        &self,
        relationship_type: RelationshipType,
        max_hops: u32,
    ) -> Vec<TransitiveInference> {
        let result = self.transitive_pairs(relationship_type, max_hops).await;
        or_empty("infer_transitive", relationship_type.as_str(), result)
    }

    /// Two-hop neighbours of `hash` with no direct link, strongest first.
    pub async fn suggest_relationships(&self, hash: &str) -> Vec<Suggestion> {
        let result = self.two_hop_suggestions(hash).await;
        or_empty("suggest_relationships", hash, result)
    }

    // ========================================================================
    // Internal helpers
    // ========================================================================

    async fn neighbours(
        &self,
        hash: &str,
        relationship_type: RelationshipType,
        direction: Direction,
    ) -> Result<Vec<String>> {
        let connected = self
            .storage
            .find_connected(hash, 1, Some(relationship_type), direction)
            .await?;
        Ok(connected.into_iter().map(|c| c.hash).collect())
    }

    async fn shared_tag(&self, lookup: &dyn MemoryLookup, hash: &str) -> Result<Option<String>> {
        let Some(memory) = lookup.get_memory(hash).await? else {
            return Ok(None);
        };
        if memory.tags.is_empty() {
            return Ok(None);
        }

        let neighbours: Vec<String> = self
            .storage
            .find_connected(hash, 1, None, Direction::Both)
            .await?
            .into_iter()
            .map(|c| c.hash)
            .collect();
        let records = lookup.get_memories(&neighbours).await?;

        let own: HashSet<&str> = memory.tags.iter().map(String::as_str).collect();
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for record in records.values().filter(|r| !r.is_deleted()) {
            let tags: HashSet<&str> = record.tags.iter().map(String::as_str).collect();
            for tag in tags.intersection(&own) {
                *counts.entry(*tag).or_default() += 1;
            }
        }

        // BTreeMap iterates alphabetically; max_by_key keeps the last max, so reverse.
        Ok(counts
            .into_iter()
            .rev()
            .max_by_key(|(_, count)| *count)
            .map(|(tag, _)| tag.to_string()))
    }

    async fn transitive_pairs(
        &self,
        relationship_type: RelationshipType,
        max_hops: u32,
    ) -> Result<Vec<TransitiveInference>> {
        if max_hops < 2 {
            return Ok(Vec::new());
        }

        let symmetric = relationship_type.is_symmetric();
        let mut seen: HashSet<(String, String)> = HashSet::new();
        let mut inferred = Vec::new();

        for source in self
            .storage
            .sources_with_relationship(relationship_type)
            .await?
        {
            let reached = self
                .storage
                .find_connected(&source, max_hops, Some(relationship_type), Direction::Outgoing)
                .await?;
            let direct: HashSet<&str> = reached
                .iter()
                .filter(|c| c.distance == 1)
                .map(|c| c.hash.as_str())
                .collect();

            for connected in shortest_distances(reached.clone()) {
                if connected.distance < 2 || direct.contains(connected.hash.as_str()) {
                    continue;
                }
                let key = if symmetric && connected.hash < source {
                    (connected.hash.clone(), source.clone())
                } else {
                    (source.clone(), connected.hash.clone())
                };
                if seen.insert(key) {
                    inferred.push(TransitiveInference {
                        source: source.clone(),
                        target: connected.hash,
                        relationship_type,
                        distance: connected.distance,
                    });
                }
            }
        }

        tracing::debug!(
            relationship = relationship_type.as_str(),
            max_hops,
            inferred = inferred.len(),
            "Transitive inference complete"
        );
        Ok(inferred)
    }

    async fn two_hop_suggestions(&self, hash: &str) -> Result<Vec<Suggestion>> {
        let hash = hash.trim();
        if hash.is_empty() {
            return Ok(Vec::new());
        }

        let direct = self.neighbour_similarities(hash).await?;
        let mut best: HashMap<String, Suggestion> = HashMap::new();

        for (via, first_leg) in &direct {
            for (candidate, second_leg) in self.neighbour_similarities(via).await? {
                if candidate == hash || direct.contains_key(&candidate) {
                    continue;
                }
                let score = first_leg * second_leg;
                let better = best.get(&candidate).map_or(true, |s| {
                    score > s.score || (score == s.score && via.as_str() < s.via.as_str())
                });
                if better {
                    best.insert(
                        candidate.clone(),
                        Suggestion {
                            hash: candidate,
                            via: via.clone(),
                            score,
                        },
                    );
                }
            }
        }

        let mut suggestions: Vec<Suggestion> = best.into_values().collect();
        suggestions.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.hash.cmp(&b.hash))
        });
        Ok(suggestions)
    }

    /// Direct neighbours of `hash` with the strongest similarity to each.
    async fn neighbour_similarities(&self, hash: &str) -> Result<BTreeMap<String, f64>> {
        let mut similarities: BTreeMap<String, f64> = BTreeMap::new();
        for association in self.storage.get_associations(hash).await? {
            let other = if association.source_hash == hash {
                association.target_hash
            } else {
                association.source_hash
            };
            let entry = similarities.entry(other).or_insert(association.similarity);
            *entry = entry.max(association.similarity);
        }
        Ok(similarities)
    }
}

/// Keep the first (shortest) distance reported per hash, preserving order.
fn shortest_distances(connected: Vec<ConnectedMemory>) -> Vec<ConnectedMemory> {
    let mut seen = HashSet::new();
    connected
        .into_iter()
        .filter(|c| seen.insert(c.hash.clone()))
        .collect()
}

fn or_empty<T: Default>(operation: &str, subject: &str, result: Result<T>) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            tracing::error!(operation, subject = %subject, error = %e, "Graph reasoning query failed");
            T::default()
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::SqliteMemoryCatalog;
    use crate::models::MemoryRecord;

    async fn link(storage: &GraphStorage, a: &str, b: &str, similarity: f64, rel: RelationshipType) {
        assert!(storage
            .store_association(a, b, similarity, &[], None, Some(rel))
            .await
            .unwrap());
    }

    fn sorted(mut values: Vec<String>) -> Vec<String> {
        values.sort();
        values
    }

    // ========================================================================
    // TEST 1: causes / fixes / contradictions
    // ========================================================================
    #[tokio::test]
    async fn test_direct_causal_queries() {
        let storage = GraphStorage::in_memory().await.unwrap();
        link(&storage, "decision", "error", 0.8, RelationshipType::Causes).await;
        link(&storage, "learning", "error", 0.9, RelationshipType::Fixes).await;
        link(&storage, "claim", "counter", 0.6, RelationshipType::Contradicts).await;
        link(&storage, "error", "aftermath", 0.5, RelationshipType::Causes).await;

        let reasoner = SemanticReasoner::new(storage);
        assert_eq!(reasoner.find_causes("error").await, vec!["decision"]);
        assert_eq!(reasoner.find_fixes("error").await, vec!["learning"]);
        assert!(reasoner.find_fixes("decision").await.is_empty());
        assert_eq!(reasoner.detect_contradictions("claim").await, vec!["counter"]);
        assert_eq!(reasoner.detect_contradictions("counter").await, vec!["claim"]);
        assert!(reasoner.detect_contradictions("error").await.is_empty());
    }

    // ========================================================================
    // TEST 2: causal chain walks backwards, shortest distance wins
    // ========================================================================
    #[tokio::test]
    async fn test_find_causal_chain() {
        let storage = GraphStorage::in_memory().await.unwrap();
        link(&storage, "root", "middle", 0.7, RelationshipType::Causes).await;
        link(&storage, "middle", "effect", 0.7, RelationshipType::Causes).await;
        link(&storage, "root", "effect", 0.7, RelationshipType::Causes).await;
        link(&storage, "unrelated", "middle", 0.7, RelationshipType::Supports).await;

        let reasoner = SemanticReasoner::new(storage);
        let chain = reasoner.find_causal_chain("effect", 3).await;
        assert_eq!(chain.len(), 2);
        assert!(chain.contains(&ConnectedMemory { hash: "root".to_string(), distance: 1 }));
        assert!(chain.contains(&ConnectedMemory { hash: "middle".to_string(), distance: 1 }));
    }

    // ========================================================================
    // TEST 3: transitive inference skips pairs that are already direct
    // ========================================================================
    #[tokio::test]
    async fn test_infer_transitive() {
        let storage = GraphStorage::in_memory().await.unwrap();
        link(&storage, "a", "b", 0.7, RelationshipType::Causes).await;
        link(&storage, "b", "c", 0.7, RelationshipType::Causes).await;
        link(&storage, "c", "d", 0.7, RelationshipType::Causes).await;
        link(&storage, "a", "c", 0.7, RelationshipType::Causes).await;

        let reasoner = SemanticReasoner::new(storage);
        assert!(reasoner.infer_transitive(RelationshipType::Causes, 1).await.is_empty());

        let two_hops = reasoner.infer_transitive(RelationshipType::Causes, 2).await;
        let pairs: HashSet<(String, String, u32)> = two_hops
            .iter()
            .map(|t| (t.source.clone(), t.target.clone(), t.distance))
            .collect();
        assert_eq!(
            pairs,
            HashSet::from([
                ("a".to_string(), "d".to_string(), 2),
                ("b".to_string(), "d".to_string(), 2),
            ])
        );
    }

    // ========================================================================
    // TEST 4: symmetric transitive pairs are reported once
    // ========================================================================
    #[tokio::test]
    async fn test_infer_transitive_symmetric_dedup() {
        let storage = GraphStorage::in_memory().await.unwrap();
        link(&storage, "x", "y", 0.7, RelationshipType::Related).await;
        link(&storage, "y", "z", 0.7, RelationshipType::Related).await;

        let reasoner = SemanticReasoner::new(storage);
        let inferred = reasoner.infer_transitive(RelationshipType::Related, 2).await;
        assert_eq!(inferred.len(), 1);
        let pair = sorted(vec![inferred[0].source.clone(), inferred[0].target.clone()]);
        assert_eq!(pair, vec!["x", "z"]);
    }

    // ========================================================================
    // TEST 5: suggestions ranked by path strength
    // ========================================================================
    #[tokio::test]
    async fn test_suggest_relationships() {
        let storage = GraphStorage::in_memory().await.unwrap();
        link(&storage, "me", "strong", 0.9, RelationshipType::Related).await;
        link(&storage, "me", "weak", 0.5, RelationshipType::Supports).await;
        link(&storage, "strong", "far1", 0.8, RelationshipType::Causes).await;
        link(&storage, "weak", "far1", 0.9, RelationshipType::Related).await;
        link(&storage, "weak", "far2", 0.4, RelationshipType::Follows).await;
        link(&storage, "strong", "weak", 0.7, RelationshipType::Related).await;

        let reasoner = SemanticReasoner::new(storage);
        let suggestions = reasoner.suggest_relationships("me").await;

        assert_eq!(suggestions.len(), 2);
        assert_eq!(suggestions[0].hash, "far1");
        assert_eq!(suggestions[0].via, "strong");
        assert!((suggestions[0].score - 0.72).abs() < 1e-9);
        assert_eq!(suggestions[1].hash, "far2");
        assert!((suggestions[1].score - 0.2).abs() < 1e-9);
        assert!(reasoner.suggest_relationships("").await.is_empty());
    }

    // ========================================================================
    // TEST 6: concept abstraction uses shared tags of live neighbours
    // ========================================================================
    #[tokio::test]
    async fn test_abstract_to_concept() {
        let storage = GraphStorage::in_memory().await.unwrap();
        let catalog = SqliteMemoryCatalog::new(storage.pool().clone());
        let records = [
            MemoryRecord::new("center", "c").with_tags(["auth", "latency", "rust"]),
            MemoryRecord::new("n1", "1").with_tags(["latency", "auth"]),
            MemoryRecord::new("n2", "2").with_tags(["latency"]),
            MemoryRecord::new("n3", "3").with_tags(["rust"]),
            MemoryRecord::new("n4", "4").with_tags(["rust"]),
            MemoryRecord::new("n5", "5").with_tags(["rust"]),
        ];
        for record in &records {
            catalog.insert_memory(record).await.unwrap();
        }
        catalog.soft_delete("n4").await.unwrap();
        catalog.soft_delete("n5").await.unwrap();
        for n in ["n1", "n2", "n3", "n4", "n5"] {
            link(&storage, "center", n, 0.7, RelationshipType::Related).await;
        }

        let without_lookup = SemanticReasoner::new(storage.clone());
        assert_eq!(without_lookup.abstract_to_concept("center").await, None);

        let reasoner = SemanticReasoner::new(storage).with_lookup(Arc::new(catalog));
        assert_eq!(
            reasoner.abstract_to_concept("center").await,
            Some("latency".to_string())
        );
        assert_eq!(reasoner.abstract_to_concept("unknown").await, None);
    }

    // ========================================================================
    // TEST 7: storage failures degrade to empty results
    // ========================================================================
    #[tokio::test]
    async fn test_storage_failure_degrades_to_empty() {
        let storage = GraphStorage::in_memory().await.unwrap();
        link(&storage, "a", "b", 0.7, RelationshipType::Causes).await;
        sqlx::query("DROP TABLE memory_graph")
            .execute(storage.pool())
            .await
            .unwrap();

        let reasoner = SemanticReasoner::new(storage);
        assert!(reasoner.find_causes("b").await.is_empty());
        assert!(reasoner.find_causal_chain("b", 3).await.is_empty());
        assert!(reasoner.infer_transitive(RelationshipType::Causes, 3).await.is_empty());
        assert!(reasoner.suggest_relationships("a").await.is_empty());
    }
}
