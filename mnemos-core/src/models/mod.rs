pub mod association;
pub mod graph;
pub mod memory;

pub use association::{Association, AssociationRow, Direction};
pub use graph::{
    ConnectedMemory, GraphStats, GraphVisualization, Subgraph, SubgraphEdge, VisualEdge,
    VisualNode, VisualizationMeta,
};
pub use memory::MemoryRecord;
