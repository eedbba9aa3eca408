//! Graph storage: typed associations between memories
//!
//! Owns the `memory_graph` table and every query over it:
//! - `store_association` / `delete_association`: idempotent writes, symmetric
//!   relationships materialized as two directed rows
//! - `find_connected`: layered BFS up to `max_hops`, cycle-safe
//! - `shortest_path`: BFS over the undirected view, minimal length
//! - `get_subgraph`: induced subgraph around a center, symmetric pairs merged
//! - distribution / visualization / stats helpers for dashboards
//!
//! Mutations are serialized by a write lock and run in a short transaction.
//! Reads only hold a pooled connection for the duration of each query and are
//! bounded by the caller's hop/depth/radius limit.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use serde_json::{Map, Value};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tokio::sync::Mutex;

use crate::config::DatabaseConfig;
use crate::db;
use crate::error::Result;
use crate::memory::MemoryLookup;
use crate::models::{
    Association, AssociationRow, ConnectedMemory, Direction, GraphStats, GraphVisualization,
    Subgraph, SubgraphEdge, VisualEdge, VisualNode, VisualizationMeta,
};
use crate::ontology::RelationshipType;

/// Bound parameters per `IN (...)` query, well under SQLite's variable limit.
const IN_CHUNK: usize = 400;

/// Visualization nodes show at most this many characters of content.
const VISUAL_CONTENT_CHARS: usize = 100;

const ASSOCIATION_COLUMNS: &str =
    "source_hash, target_hash, similarity, connection_types, metadata, created_at, relationship_type";

#[derive(Clone)]
pub struct GraphStorage {
    pool: SqlitePool,
    write_lock: Arc<Mutex<()>>,
}

impl GraphStorage {
    /// Wrap an existing pool. The schema must already exist (see `db::create_pool`).
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub async fn open(config: &DatabaseConfig) -> Result<Self> {
        let pool = db::create_pool(config).await?;
        Ok(Self::new(pool))
    }

    /// Private in-memory graph (tests, dry runs).
    pub async fn in_memory() -> Result<Self> {
        Self::open(&DatabaseConfig::in_memory()).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Store (or replace) an association.
    ///
    /// # Returns
    /// * `Ok(true)` - row(s) written
    /// * `Ok(false)` - rejected input: empty hash, self-loop or non-finite similarity
    /// * `Err` - storage failure
    ///
    /// # Constraints
    /// * Symmetric types (`related`, `contradicts`) write source→target and target→source
    /// * Asymmetric and untyped associations write a single row
    /// * Upsert on `(source_hash, target_hash)`: repeating a call never duplicates rows
    /// * Retyping a symmetric pair to an asymmetric type removes the reverse row
    pub async fn store_association(
        &self,
        source_hash: &str,
        target_hash: &str,
        similarity: f64,
        connection_types: &[String],
        metadata: Option<&Map<String, Value>>,
        relationship_type: Option<RelationshipType>,
    ) -> Result<bool> {
        let source_hash = source_hash.trim();
        let target_hash = target_hash.trim();

        if source_hash.is_empty() || target_hash.is_empty() {
            tracing::warn!("Rejected association with empty source or target hash");
            return Ok(false);
        }
        if source_hash == target_hash {
            tracing::warn!(hash = %source_hash, "Rejected self-loop association");
            return Ok(false);
        }
        if !similarity.is_finite() {
            tracing::warn!(source = %source_hash, target = %target_hash, "Rejected association with non-finite similarity");
            return Ok(false);
        }

        let similarity = similarity.clamp(0.0, 1.0);
        let connection_types_json = serde_json::to_string(connection_types)?;
        let metadata_json = metadata.map(serde_json::to_string).transpose()?;
        let created_at = crate::now_epoch_seconds();
        let relationship = relationship_type.map(|r| r.as_str());
        let symmetric = relationship_type.map(|r| r.is_symmetric()).unwrap_or(false);

        let mut directions = vec![(source_hash, target_hash)];
        if symmetric {
            directions.push((target_hash, source_hash));
        }

        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        let forward_previous = stored_relationship(&mut *tx, source_hash, target_hash).await?;
        let reverse_previous = stored_relationship(&mut *tx, target_hash, source_hash).await?;
        if let Some(previous) = &forward_previous {
            if previous.as_deref() != relationship {
                tracing::debug!(
                    source = %source_hash,
                    target = %target_hash,
                    previous = previous.as_deref().unwrap_or("untyped"),
                    relationship = relationship.unwrap_or("untyped"),
                    "Replacing differently typed association"
                );
            }
        }
        if let Some(previous) = &reverse_previous {
            if symmetric && previous.as_deref() != relationship {
                tracing::debug!(
                    source = %target_hash,
                    target = %source_hash,
                    previous = previous.as_deref().unwrap_or("untyped"),
                    relationship = relationship.unwrap_or("untyped"),
                    "Replacing differently typed reverse association"
                );
            } else if !symmetric && is_symmetric_type(previous.as_deref()) {
                // A symmetric pair never survives as a single directed row
                sqlx::query("DELETE FROM memory_graph WHERE source_hash = ? AND target_hash = ?")
                    .bind(target_hash)
                    .bind(source_hash)
                    .execute(&mut *tx)
                    .await?;
                tracing::debug!(
                    source = %target_hash,
                    target = %source_hash,
                    previous = previous.as_deref().unwrap_or("untyped"),
                    "Removed symmetric twin of retyped association"
                );
            }
        }

        for (from, to) in &directions {
            sqlx::query(
                r#"
                INSERT INTO memory_graph
                    (source_hash, target_hash, similarity, connection_types, metadata, created_at, relationship_type)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT (source_hash, target_hash)
                DO UPDATE SET
                    similarity = excluded.similarity,
                    connection_types = excluded.connection_types,
                    metadata = excluded.metadata,
                    created_at = excluded.created_at,
                    relationship_type = excluded.relationship_type
                "#,
            )
            .bind(*from)
            .bind(*to)
            .bind(similarity)
            .bind(&connection_types_json)
            .bind(metadata_json.as_deref())
            .bind(created_at)
            .bind(relationship)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        tracing::debug!(
            source = %source_hash,
            target = %target_hash,
            relationship = relationship.unwrap_or("untyped"),
            rows = directions.len(),
            "Stored association"
        );
        Ok(true)
    }

    /// Remove the association between two memories in both directions.
    /// Returns `false` when nothing was stored, so repeated calls are harmless.
    pub async fn delete_association(&self, source_hash: &str, target_hash: &str) -> Result<bool> {
        let source_hash = source_hash.trim();
        let target_hash = target_hash.trim();
        if source_hash.is_empty() || target_hash.is_empty() {
            tracing::warn!("Rejected delete with empty source or target hash");
            return Ok(false);
        }

        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            r#"
            DELETE FROM memory_graph
            WHERE (source_hash = ? AND target_hash = ?)
               OR (source_hash = ? AND target_hash = ?)
            "#,
        )
        .bind(source_hash)
        .bind(target_hash)
        .bind(target_hash)
        .bind(source_hash)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        let deleted = result.rows_affected();
        if deleted > 0 {
            tracing::debug!(source = %source_hash, target = %target_hash, rows = deleted, "Deleted association");
        }
        Ok(deleted > 0)
    }

    // ========================================================================
    // Row reads
    // ========================================================================

    pub async fn get_association(
        &self,
        source_hash: &str,
        target_hash: &str,
    ) -> Result<Option<Association>> {
        let sql = format!(
            "SELECT {} FROM memory_graph WHERE source_hash = ? AND target_hash = ?",
            ASSOCIATION_COLUMNS
        );
        let row = sqlx::query_as::<_, AssociationRow>(&sql)
            .bind(source_hash)
            .bind(target_hash)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Association::try_from).transpose()
    }

    /// Every directed row touching `hash`, outgoing first.
    pub async fn get_associations(&self, hash: &str) -> Result<Vec<Association>> {
        let sql = format!(
            r#"
            SELECT {} FROM memory_graph
            WHERE source_hash = ? OR target_hash = ?
            ORDER BY (source_hash != ?), source_hash, target_hash
            "#,
            ASSOCIATION_COLUMNS
        );
        let rows = sqlx::query_as::<_, AssociationRow>(&sql)
            .bind(hash)
            .bind(hash)
            .bind(hash)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Association::try_from).collect()
    }

    /// Number of distinct direct neighbours of `hash`, in either direction.
    pub async fn get_association_count(&self, hash: &str) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM (
                SELECT target_hash AS other FROM memory_graph WHERE source_hash = ?
                UNION
                SELECT source_hash AS other FROM memory_graph WHERE target_hash = ?
            )
            "#,
        )
        .bind(hash)
        .bind(hash)
        .fetch_one(&self.pool)
        .await?;
        Ok(count.max(0) as u64)
    }

    /// Distinct hashes with at least one outgoing row of `relationship_type`.
    pub async fn sources_with_relationship(
        &self,
        relationship_type: RelationshipType,
    ) -> Result<Vec<String>> {
        let sources: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT source_hash FROM memory_graph WHERE relationship_type = ? ORDER BY source_hash",
        )
        .bind(relationship_type.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(sources)
    }

    // ========================================================================
    // Traversal
    // ========================================================================

    /// Breadth-first search from `hash` up to `max_hops` edges.
    ///
    /// Every simple path up to `max_hops` is followed: a hash is never
    /// re-entered along the path that reached it, so cyclic graphs terminate.
    /// A hash is reported once per distance at which some simple path reaches
    /// it, independent of hash ordering. The origin itself is never reported.
    pub async fn find_connected(
        &self,
        hash: &str,
        max_hops: u32,
        relationship_type: Option<RelationshipType>,
        direction: Direction,
    ) -> Result<Vec<ConnectedMemory>> {
        let origin = hash.trim();
        if origin.is_empty() {
            tracing::warn!("find_connected called with empty hash");
            return Ok(Vec::new());
        }

        let mut results = Vec::new();
        let mut reported: HashSet<(String, u32)> = HashSet::new();
        // Simple paths reaching the same hash through the same set of nodes
        // have identical continuations, so only one of them is expanded.
        let mut expanded: HashSet<(String, BTreeSet<String>)> = HashSet::new();
        let mut frontier: Vec<(String, BTreeSet<String>)> =
            vec![(origin.to_string(), BTreeSet::from([origin.to_string()]))];

        for depth in 1..=max_hops {
            if frontier.is_empty() {
                break;
            }

            let layer = unique_nodes(frontier.iter().map(|(node, _)| node.as_str()));
            let adjacency = self.neighbours(&layer, direction, relationship_type).await?;

            let mut next = Vec::new();
            for (node, path) in &frontier {
                let Some(neighbours) = adjacency.get(node) else {
                    continue;
                };
                for neighbour in neighbours {
                    if path.contains(neighbour) {
                        continue;
                    }
                    if reported.insert((neighbour.clone(), depth)) {
                        results.push(ConnectedMemory {
                            hash: neighbour.clone(),
                            distance: depth,
                        });
                    }
                    if depth < max_hops {
                        let mut extended = path.clone();
                        extended.insert(neighbour.clone());
                        if expanded.insert((neighbour.clone(), extended.clone())) {
                            next.push((neighbour.clone(), extended));
                        }
                    }
                }
            }
            frontier = next;
        }

        tracing::debug!(
            origin = %origin,
            max_hops,
            direction = %direction,
            found = results.len(),
            "find_connected complete"
        );
        Ok(results)
    }

    /// Minimal-length path between two memories, edges followed in either direction.
    ///
    /// # Returns
    /// * `Some([hash1])` when both hashes are the same
    /// * `Some(path)` including both endpoints
    /// * `None` when no path exists within `max_depth` edges or input is empty
    pub async fn shortest_path(
        &self,
        hash1: &str,
        hash2: &str,
        max_depth: u32,
    ) -> Result<Option<Vec<String>>> {
        let start = hash1.trim();
        let goal = hash2.trim();
        if start.is_empty() || goal.is_empty() {
            tracing::warn!("shortest_path called with empty hash");
            return Ok(None);
        }
        if start == goal {
            return Ok(Some(vec![start.to_string()]));
        }

        let mut parents: HashMap<String, String> = HashMap::new();
        let mut visited: HashSet<String> = HashSet::from([start.to_string()]);
        let mut frontier = vec![start.to_string()];

        for _ in 0..max_depth {
            if frontier.is_empty() {
                break;
            }
            let adjacency = self.neighbours(&frontier, Direction::Both, None).await?;

            let mut next = Vec::new();
            for node in &frontier {
                let Some(neighbours) = adjacency.get(node) else {
                    continue;
                };
                for neighbour in neighbours {
                    if !visited.insert(neighbour.clone()) {
                        continue;
                    }
                    parents.insert(neighbour.clone(), node.clone());
                    if neighbour == goal {
                        return Ok(Some(rebuild_path(&parents, start, goal)));
                    }
                    next.push(neighbour.clone());
                }
            }
            frontier = next;
        }

        Ok(None)
    }

    /// Nodes within `radius` hops of `center` and every stored edge between them.
    pub async fn get_subgraph(&self, center: &str, radius: u32) -> Result<Subgraph> {
        let center = center.trim();
        if center.is_empty() {
            tracing::warn!("get_subgraph called with empty hash");
            return Ok(Subgraph::default());
        }

        let connected = self
            .find_connected(center, radius, None, Direction::Both)
            .await?;
        let nodes = unique_nodes(
            std::iter::once(center).chain(connected.iter().map(|c| c.hash.as_str())),
        );
        let rows = self.rows_between(&nodes).await?;

        Ok(Subgraph {
            nodes,
            edges: merge_bidirectional(rows),
        })
    }

    // ========================================================================
    // Aggregates
    // ========================================================================

    /// Directed row counts per relationship type; null/empty types are "untyped".
    pub async fn get_relationship_type_distribution(&self) -> Result<BTreeMap<String, u64>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT COALESCE(NULLIF(relationship_type, ''), 'untyped') AS rel, COUNT(*)
            FROM memory_graph
            GROUP BY rel
            ORDER BY rel
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(rel, count)| (rel, count.max(0) as u64))
            .collect())
    }

    pub async fn stats(&self) -> Result<GraphStats> {
        let directed_rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM memory_graph")
            .fetch_one(&self.pool)
            .await?;
        let logical_edges: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM (
                SELECT DISTINCT
                    MIN(source_hash, target_hash),
                    MAX(source_hash, target_hash),
                    COALESCE(relationship_type, '')
                FROM memory_graph
            )
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        let nodes: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM (
                SELECT source_hash FROM memory_graph
                UNION
                SELECT target_hash FROM memory_graph
            )
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(GraphStats {
            directed_rows: directed_rows.max(0) as u64,
            logical_edges: logical_edges.max(0) as u64,
            nodes: nodes.max(0) as u64,
        })
    }

    /// Capped, most-connected-first payload for graph rendering.
    ///
    /// Memories the lookup cannot find or reports as soft-deleted are skipped,
    /// and so is every edge touching them.
    pub async fn get_graph_visualization_data(
        &self,
        lookup: &dyn MemoryLookup,
        limit: usize,
        min_connections: u64,
    ) -> Result<GraphVisualization> {
        let stats = self.stats().await?;
        let mut meta = VisualizationMeta {
            total_nodes: stats.nodes,
            total_edges: stats.logical_edges,
            limit,
            min_connections,
            ..VisualizationMeta::default()
        };
        if limit == 0 {
            return Ok(GraphVisualization {
                meta,
                ..GraphVisualization::default()
            });
        }

        let ranked: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT hash, COUNT(DISTINCT other) AS connections FROM (
                SELECT source_hash AS hash, target_hash AS other FROM memory_graph
                UNION ALL
                SELECT target_hash AS hash, source_hash AS other FROM memory_graph
            )
            GROUP BY hash
            HAVING connections >= ?
            ORDER BY connections DESC, hash ASC
            "#,
        )
        .bind(i64::try_from(min_connections).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        let mut nodes: Vec<VisualNode> = Vec::new();
        for batch in ranked.chunks(limit.max(IN_CHUNK / 4)) {
            let hashes: Vec<String> = batch.iter().map(|(h, _)| h.clone()).collect();
            let records = lookup.get_memories(&hashes).await?;
            for (hash, connections) in batch {
                let Some(record) = records.get(hash) else {
                    continue;
                };
                if record.is_deleted() {
                    continue;
                }
                nodes.push(VisualNode {
                    id: hash.clone(),
                    memory_type: record.memory_type.clone(),
                    content: truncate_content(&record.content, VISUAL_CONTENT_CHARS),
                    connection_count: (*connections).max(0) as u64,
                    tags: record.tags.clone(),
                });
                if nodes.len() >= limit {
                    break;
                }
            }
            if nodes.len() >= limit {
                break;
            }
        }

        let kept: Vec<String> = nodes.iter().map(|n| n.id.clone()).collect();
        let edges: Vec<VisualEdge> = merge_bidirectional(self.rows_between(&kept).await?)
            .into_iter()
            .map(|e| VisualEdge {
                source: e.source,
                target: e.target,
                relationship_type: e.relationship_type,
                similarity: e.similarity,
                connection_types: e.connection_types,
            })
            .collect();

        meta.returned_nodes = nodes.len();
        meta.returned_edges = edges.len();
        Ok(GraphVisualization { nodes, edges, meta })
    }

    // ========================================================================
    // Internal helpers
    // ========================================================================

    /// Adjacency for a layer of nodes, following `direction`.
    /// Neighbour lists are deduplicated and ordered by hash.
    async fn neighbours(
        &self,
        nodes: &[String],
        direction: Direction,
        relationship_type: Option<RelationshipType>,
    ) -> Result<HashMap<String, Vec<String>>> {
        let mut adjacency: HashMap<String, Vec<String>> = HashMap::new();
        if nodes.is_empty() {
            return Ok(adjacency);
        }

        let passes: &[(&str, &str)] = match direction {
            Direction::Outgoing => &[("source_hash", "target_hash")],
            Direction::Incoming => &[("target_hash", "source_hash")],
            Direction::Both => &[("source_hash", "target_hash"), ("target_hash", "source_hash")],
        };

        let mut pairs: Vec<(String, String)> = Vec::new();
        for (origin_col, neighbour_col) in passes {
            for chunk in nodes.chunks(IN_CHUNK) {
                let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
                    "SELECT {origin_col}, {neighbour_col} FROM memory_graph WHERE {origin_col} IN ("
                ));
                let mut separated = qb.separated(", ");
                for node in chunk {
                    separated.push_bind(node.as_str());
                }
                separated.push_unseparated(")");
                if let Some(rel) = relationship_type {
                    qb.push(" AND relationship_type = ").push_bind(rel.as_str());
                }

                let rows: Vec<(String, String)> =
                    qb.build_query_as().fetch_all(&self.pool).await?;
                pairs.extend(rows);
            }
        }

        pairs.sort();
        pairs.dedup();
        for (origin, neighbour) in pairs {
            adjacency.entry(origin).or_default().push(neighbour);
        }
        Ok(adjacency)
    }

    /// Stored rows with both endpoints inside `nodes`, ordered by (source, target).
    async fn rows_between(&self, nodes: &[String]) -> Result<Vec<Association>> {
        if nodes.is_empty() {
            return Ok(Vec::new());
        }
        let members: HashSet<&str> = nodes.iter().map(String::as_str).collect();

        let mut rows = Vec::new();
        for chunk in nodes.chunks(IN_CHUNK) {
            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
                "SELECT {} FROM memory_graph WHERE source_hash IN (",
                ASSOCIATION_COLUMNS
            ));
            let mut separated = qb.separated(", ");
            for node in chunk {
                separated.push_bind(node.as_str());
            }
            separated.push_unseparated(")");

            let fetched: Vec<AssociationRow> = qb.build_query_as().fetch_all(&self.pool).await?;
            for row in fetched {
                if members.contains(row.target_hash.as_str()) {
                    rows.push(Association::try_from(row)?);
                }
            }
        }

        rows.sort_by(|a, b| {
            (a.source_hash.as_str(), a.target_hash.as_str())
                .cmp(&(b.source_hash.as_str(), b.target_hash.as_str()))
        });
        Ok(rows)
    }
}

/// Relationship column of one directed row: `None` when no row exists,
/// `Some(None)` for an untyped row.
async fn stored_relationship(
    conn: &mut SqliteConnection,
    source_hash: &str,
    target_hash: &str,
) -> Result<Option<Option<String>>> {
    let relationship: Option<Option<String>> = sqlx::query_scalar(
        "SELECT relationship_type FROM memory_graph WHERE source_hash = ? AND target_hash = ?",
    )
    .bind(source_hash)
    .bind(target_hash)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(relationship)
}

fn is_symmetric_type(relationship: Option<&str>) -> bool {
    relationship
        .and_then(|r| r.parse::<RelationshipType>().ok())
        .is_some_and(|r| r.is_symmetric())
}

/// Deduplicate while keeping first-seen order.
fn unique_nodes<'a>(hashes: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    hashes
        .into_iter()
        .filter(|h| seen.insert(*h))
        .map(str::to_string)
        .collect()
}

fn rebuild_path(parents: &HashMap<String, String>, start: &str, goal: &str) -> Vec<String> {
    let mut path = vec![goal.to_string()];
    let mut current = goal;
    while current != start {
        match parents.get(current) {
            Some(parent) => {
                path.push(parent.clone());
                current = parent.as_str();
            }
            None => break,
        }
    }
    path.reverse();
    path
}

/// Collapse row pairs that describe the same relationship in both directions.
/// Rows must be sorted so the first orientation seen is reported.
fn merge_bidirectional(rows: Vec<Association>) -> Vec<SubgraphEdge> {
    let mut index: HashMap<(String, String, Option<RelationshipType>), usize> = HashMap::new();
    let mut edges: Vec<SubgraphEdge> = Vec::new();

    for row in rows {
        let key = if row.source_hash <= row.target_hash {
            (row.source_hash.clone(), row.target_hash.clone(), row.relationship_type)
        } else {
            (row.target_hash.clone(), row.source_hash.clone(), row.relationship_type)
        };

        match index.get(&key) {
            Some(&i) => {
                if edges[i].source == row.target_hash && edges[i].target == row.source_hash {
                    edges[i].bidirectional = true;
                }
            }
            None => {
                index.insert(key, edges.len());
                edges.push(SubgraphEdge {
                    source: row.source_hash,
                    target: row.target_hash,
                    similarity: row.similarity,
                    connection_types: row.connection_types,
                    metadata: row.metadata,
                    relationship_type: row.relationship_type,
                    bidirectional: false,
                });
            }
        }
    }
    edges
}

fn truncate_content(content: &str, max_chars: usize) -> String {
    if content.chars().count() <= max_chars {
        content.to_string()
    } else {
        let truncated: String = content.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

// ============================================================================
// TESTS
// ============================================================================
