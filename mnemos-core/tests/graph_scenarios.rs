use std::collections::HashSet;

use mnemos_core::config::DatabaseConfig;
use mnemos_core::models::{ConnectedMemory, Direction};
use mnemos_core::{GraphStorage, RelationshipType, SemanticReasoner};
use proptest::prelude::*;

async fn related(storage: &GraphStorage, a: &str, b: &str, similarity: f64) {
    let stored = storage
        .store_association(a, b, similarity, &["semantic".to_string()], None, Some(RelationshipType::Related))
        .await
        .expect("store failed");
    assert!(stored);
}

fn contains(results: &[ConnectedMemory], hash: &str, distance: u32) -> bool {
    results
        .iter()
        .any(|c| c.hash == hash && c.distance == distance)
}

// ============================================================================
// Scenario A: linear chain
// ============================================================================
#[tokio::test]
async fn test_scenario_a_linear_chain() {
    let storage = GraphStorage::in_memory().await.unwrap();
    related(&storage, "A", "B", 0.7).await;
    related(&storage, "B", "C", 0.7).await;
    related(&storage, "C", "D", 0.7).await;

    let two = storage
        .find_connected("A", 2, None, Direction::Both)
        .await
        .unwrap();
    assert!(contains(&two, "B", 1));
    assert!(contains(&two, "C", 2));
    assert!(two.iter().all(|c| c.hash != "D"));

    let three = storage
        .find_connected("A", 3, None, Direction::Both)
        .await
        .unwrap();
    assert!(contains(&three, "D", 3));
}

// ============================================================================
// Scenario B: diamond
// ============================================================================
#[tokio::test]
async fn test_scenario_b_diamond_shortest_path() {
    let storage = GraphStorage::in_memory().await.unwrap();
    related(&storage, "H", "I", 0.8).await;
    related(&storage, "I", "K", 0.8).await;
    related(&storage, "H", "J", 0.7).await;
    related(&storage, "J", "K", 0.7).await;

    let path = storage.shortest_path("H", "K", 5).await.unwrap().unwrap();
    assert_eq!(path.len(), 3);
    assert_eq!(path[0], "H");
    assert!(path[1] == "I" || path[1] == "J");
    assert_eq!(path[2], "K");
}

// ============================================================================
// Scenario C: triangle terminates
// ============================================================================
#[tokio::test]
async fn test_scenario_c_triangle_cycle() {
    let storage = GraphStorage::in_memory().await.unwrap();
    related(&storage, "E", "F", 0.7).await;
    related(&storage, "F", "G", 0.7).await;
    related(&storage, "G", "E", 0.7).await;

    let found = storage
        .find_connected("E", 3, None, Direction::Both)
        .await
        .unwrap();
    let hashes: HashSet<&str> = found.iter().map(|c| c.hash.as_str()).collect();
    assert_eq!(hashes, HashSet::from(["F", "G"]));
    assert!(found.iter().all(|c| c.distance <= 3));
}

// ============================================================================
// Scenario D: hub
// ============================================================================
#[tokio::test]
async fn test_scenario_d_hub() {
    let storage = GraphStorage::in_memory().await.unwrap();
    for spoke in ["M", "N", "O", "P", "Q"] {
        related(&storage, "L", spoke, 0.7).await;
    }

    assert_eq!(storage.get_association_count("L").await.unwrap(), 5);

    let subgraph = storage.get_subgraph("L", 1).await.unwrap();
    assert_eq!(subgraph.nodes.len(), 6);
    assert_eq!(subgraph.edges.len(), 5);
    assert!(subgraph.edges.iter().all(|e| e.bidirectional));
}

// ============================================================================
// Scenario E: causes and fixes
// ============================================================================
#[tokio::test]
async fn test_scenario_e_causes_and_fixes() {
    let storage = GraphStorage::in_memory().await.unwrap();
    assert!(storage
        .store_association("X", "Y", 0.8, &["causal".to_string()], None, Some(RelationshipType::Causes))
        .await
        .unwrap());
    assert!(storage
        .store_association("Z", "Y", 0.8, &["causal".to_string()], None, Some(RelationshipType::Fixes))
        .await
        .unwrap());

    let reasoner = SemanticReasoner::new(storage);
    assert!(reasoner.find_causes("Y").await.contains(&"X".to_string()));
    assert!(reasoner.find_fixes("Y").await.contains(&"Z".to_string()));
}

// ============================================================================
// Concurrent writers and readers on a file database
// ============================================================================
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_store_traverse_delete() {
    let dir = tempfile::tempdir().unwrap();
    let config = DatabaseConfig {
        path: dir.path().join("graph.db").to_string_lossy().into_owned(),
        max_connections: 4,
        busy_timeout_ms: 5_000,
    };
    let storage = GraphStorage::open(&config).await.unwrap();

    let ring: Vec<String> = (0..8).map(|i| format!("r{}", i)).collect();
    let mut tasks = Vec::new();
    for i in 0..64usize {
        let storage = storage.clone();
        let a = ring[i % 8].clone();
        let b = ring[(i + 1) % 8].clone();
        let chain_source = format!("k{}", i % 4);
        let chain_target = format!("k{}", i % 4 + 1);
        tasks.push(tokio::spawn(async move {
            storage
                .store_association(&a, &b, 0.6, &[], None, Some(RelationshipType::Related))
                .await?;
            storage
                .store_association(&chain_source, &chain_target, 0.6, &[], None, Some(RelationshipType::Causes))
                .await?;
            storage.find_connected(&a, 3, None, Direction::Both).await?;
            // Pair (shared, contested) is retyped back and forth concurrently
            let contested = if i % 2 == 0 {
                RelationshipType::Contradicts
            } else {
                RelationshipType::Follows
            };
            storage
                .store_association("shared", "contested", 0.6, &[], None, Some(contested))
                .await?;
            if i % 5 == 0 {
                storage.delete_association(&b, &a).await?;
            }
            storage.shortest_path(&a, "k0", 4).await?;
            Ok::<_, mnemos_core::MnemosError>(())
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    // Related pairs are always materialized as two rows
    let mut related_rows = 0u64;
    for i in 0..8 {
        let (a, b) = (&ring[i], &ring[(i + 1) % 8]);
        let forward = storage.get_association(a, b).await.unwrap();
        let reverse = storage.get_association(b, a).await.unwrap();
        assert_eq!(forward.is_some(), reverse.is_some());
        if forward.is_some() {
            related_rows += 2;
        }
    }
    let distribution = storage.get_relationship_type_distribution().await.unwrap();
    assert_eq!(distribution.get("related").copied().unwrap_or(0), related_rows);
    assert_eq!(distribution.get("contradicts").copied().unwrap_or(0) % 2, 0);

    for i in 0..4 {
        let source = format!("k{}", i);
        let target = format!("k{}", i + 1);
        assert!(storage.get_association(&source, &target).await.unwrap().is_some());
        assert!(storage.get_association(&target, &source).await.unwrap().is_none());
    }

    let forward = storage.get_association("shared", "contested").await.unwrap().unwrap();
    let reverse = storage.get_association("contested", "shared").await.unwrap();
    let contested_rows = match forward.relationship_type {
        Some(RelationshipType::Contradicts) => {
            assert_eq!(
                reverse.map(|r| r.relationship_type),
                Some(Some(RelationshipType::Contradicts))
            );
            2
        }
        Some(RelationshipType::Follows) => {
            assert!(reverse.is_none());
            1
        }
        other => panic!("unexpected relationship {:?}", other),
    };

    let stats = storage.stats().await.unwrap();
    assert_eq!(stats.directed_rows, related_rows + 4 + contested_rows);
}

// ============================================================================
// Properties
// ============================================================================

const NODES: [&str; 6] = ["n0", "n1", "n2", "n3", "n4", "n5"];

fn edge_strategy() -> impl Strategy<Value = Vec<(usize, usize, usize)>> {
    prop::collection::vec((0..NODES.len(), 0..NODES.len(), 0..RelationshipType::ALL.len()), 0..14)
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

async fn build_graph(edges: &[(usize, usize, usize)]) -> GraphStorage {
    let storage = GraphStorage::in_memory().await.unwrap();
    for (s, t, r) in edges {
        storage
            .store_association(NODES[*s], NODES[*t], 0.5, &[], None, Some(RelationshipType::ALL[*r]))
            .await
            .unwrap();
    }
    storage
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_storing_twice_is_idempotent(edges in edge_strategy()) {
        runtime().block_on(async {
            let storage = build_graph(&edges).await;
            let once = storage.stats().await.unwrap().directed_rows;
            for (s, t, r) in &edges {
                storage
                    .store_association(NODES[*s], NODES[*t], 0.5, &[], None, Some(RelationshipType::ALL[*r]))
                    .await
                    .unwrap();
            }
            assert_eq!(storage.stats().await.unwrap().directed_rows, once);
        });
    }

    #[test]
    fn prop_single_store_row_counts(rel in 0..RelationshipType::ALL.len()) {
        runtime().block_on(async {
            let relationship = RelationshipType::ALL[rel];
            let storage = build_graph(&[(0, 1, rel)]).await;
            let expected = if relationship.is_symmetric() { 2 } else { 1 };
            assert_eq!(storage.stats().await.unwrap().directed_rows, expected);
        });
    }

    #[test]
    fn prop_find_connected_bounded(edges in edge_strategy(), origin in 0..NODES.len(), hops in 0u32..5) {
        runtime().block_on(async {
            let storage = build_graph(&edges).await;
            let found = storage
                .find_connected(NODES[origin], hops, None, Direction::Both)
                .await
                .unwrap();
            assert!(found.iter().all(|c| c.distance >= 1 && c.distance <= hops));
            assert!(found.iter().all(|c| c.hash != NODES[origin]));
        });
    }

    #[test]
    fn prop_subgraph_nodes_match_connected(edges in edge_strategy(), center in 0..NODES.len(), radius in 0u32..4) {
        runtime().block_on(async {
            let storage = build_graph(&edges).await;
            let subgraph = storage.get_subgraph(NODES[center], radius).await.unwrap();

            let unique: HashSet<&String> = subgraph.nodes.iter().collect();
            assert_eq!(unique.len(), subgraph.nodes.len());

            let mut expected: HashSet<String> = storage
                .find_connected(NODES[center], radius, None, Direction::Both)
                .await
                .unwrap()
                .into_iter()
                .map(|c| c.hash)
                .collect();
            expected.insert(NODES[center].to_string());
            let actual: HashSet<String> = subgraph.nodes.into_iter().collect();
            assert_eq!(actual, expected);
        });
    }

    #[test]
    fn prop_shortest_path_is_self_for_same_hash(node in 0..NODES.len(), depth in 0u32..4) {
        runtime().block_on(async {
            let storage = GraphStorage::in_memory().await.unwrap();
            let path = storage.shortest_path(NODES[node], NODES[node], depth).await.unwrap();
            assert_eq!(path, Some(vec![NODES[node].to_string()]));
        });
    }
}
