use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ontology::RelationshipType;

/// A hash reached by a traversal and the number of hops it took.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectedMemory {
    pub hash: String,
    pub distance: u32,
}

/// Induced subgraph around a center node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Subgraph {
    pub nodes: Vec<String>,
    pub edges: Vec<SubgraphEdge>,
}

/// One logical edge of a subgraph; symmetric row pairs collapse into a single entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubgraphEdge {
    pub source: String,
    pub target: String,
    pub similarity: f64,
    pub connection_types: Vec<String>,
    pub metadata: Map<String, Value>,
    pub relationship_type: Option<RelationshipType>,
    pub bidirectional: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualNode {
    pub id: String,
    #[serde(rename = "type")]
    pub memory_type: Option<String>,
    pub content: String,
    pub connection_count: u64,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualEdge {
    pub source: String,
    pub target: String,
    pub relationship_type: Option<RelationshipType>,
    pub similarity: f64,
    pub connection_types: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VisualizationMeta {
    pub total_nodes: u64,
    pub total_edges: u64,
    pub returned_nodes: usize,
    pub returned_edges: usize,
    pub limit: usize,
    pub min_connections: u64,
}

/// Dashboard payload: the most connected live memories and the edges between them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphVisualization {
    pub nodes: Vec<VisualNode>,
    pub edges: Vec<VisualEdge>,
    pub meta: VisualizationMeta,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    /// Physical rows, symmetric relationships count twice.
    pub directed_rows: u64,
    pub logical_edges: u64,
    pub nodes: u64,
}
