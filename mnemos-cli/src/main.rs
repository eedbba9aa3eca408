//! mnemos: operator CLI for the memory knowledge graph
//!
//! Every subcommand opens the configured SQLite database, runs one graph
//! operation and prints the result as pretty JSON on stdout.
//!
//! # Subcommands
//! - `init` / `health` / `types` / `stats`: setup and inspection
//! - `link` / `unlink` / `remember` / `autolink`: writes
//! - `connected` / `path` / `subgraph` / `count` / `distribution` / `visualize`: graph queries
//! - `infer`: classify two stored memories without linking them
//! - `causes` / `fixes` / `contradictions` / `transitive` / `suggest` / `concept`: reasoning

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing_subscriber::{fmt, EnvFilter};

use mnemos_core::models::{Direction, MemoryRecord};
use mnemos_core::{
    db, link_memory, ontology, GraphStorage, MemoryLookup, MnemosConfig, RelationshipInferenceEngine,
    RelationshipType, SemanticReasoner, SqliteMemoryCatalog,
};

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(name = "mnemos", version, about = "Typed knowledge graph over an AI memory store")]
struct Cli {
    /// Configuration file (TOML); missing file means defaults
    #[arg(short, long, env = "MNEMOS_CONFIG", default_value = "mnemos.toml")]
    config: String,

    /// Database path, overrides `database.path` from the config
    #[arg(long, env = "MNEMOS_DB")]
    db: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create the database file and schema
    Init,

    /// Check database connectivity and schema version
    Health,

    /// Print the memory type taxonomy and relationship registry
    Types,

    /// Store a typed association between two memories
    Link {
        source: String,
        target: String,

        /// causes, fixes, contradicts, supports, follows or related; omit for untyped
        #[arg(short = 't', long = "type")]
        relationship: Option<RelationshipType>,

        #[arg(short, long, default_value_t = 0.5)]
        similarity: f64,

        /// Discovery-method tags, comma separated
        #[arg(long, value_delimiter = ',')]
        connection_types: Vec<String>,

        /// Metadata as a JSON object
        #[arg(long)]
        metadata: Option<String>,
    },

    /// Delete the association between two memories (both directions)
    Unlink { source: String, target: String },

    /// Memories reachable within N hops
    Connected {
        hash: String,

        #[arg(long)]
        max_hops: Option<u32>,

        #[arg(short = 't', long = "type")]
        relationship: Option<RelationshipType>,

        /// outgoing, incoming or both
        #[arg(short, long, default_value = "both")]
        direction: Direction,
    },

    /// Shortest path between two memories
    Path {
        from: String,
        to: String,

        #[arg(long)]
        max_depth: Option<u32>,
    },

    /// Nodes and edges around a center memory
    Subgraph {
        center: String,

        #[arg(short, long)]
        radius: Option<u32>,
    },

    /// Number of distinct direct neighbours
    Count { hash: String },

    /// Directed row counts per relationship type
    Distribution,

    /// Most connected live memories and the edges between them
    Visualize {
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        #[arg(long)]
        min_connections: Option<u64>,
    },

    /// Row, edge and node totals
    Stats,

    /// Classify two stored memories without storing a link
    Infer { source: String, target: String },

    /// Link a stored memory to candidates given as HASH=SIMILARITY
    Autolink {
        source: String,

        #[arg(required = true, value_parser = parse_candidate)]
        candidates: Vec<(String, f64)>,
    },

    /// Direct causes of an effect, or the causal chain with --max-hops
    Causes {
        hash: String,

        #[arg(long)]
        max_hops: Option<u32>,
    },

    /// Memories that fix an error
    Fixes { hash: String },

    /// Memories that contradict a memory
    Contradictions { hash: String },

    /// Relationships implied by chains of one type
    Transitive {
        #[arg(short = 't', long = "type")]
        relationship: RelationshipType,

        #[arg(long)]
        max_hops: Option<u32>,
    },

    /// Two-hop neighbours worth linking directly
    Suggest {
        hash: String,

        #[arg(short = 'n', long, default_value_t = 10)]
        limit: usize,
    },

    /// Most common tag shared with direct neighbours
    Concept { hash: String },

    /// Seed a memory record into the memories table
    Remember {
        hash: String,
        content: String,

        #[arg(short = 't', long = "type")]
        memory_type: Option<String>,

        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,

        /// Creation time in epoch seconds, defaults to now
        #[arg(long)]
        created_at: Option<f64>,
    },
}

// ============================================================================
// Helpers
// ============================================================================

fn parse_candidate(raw: &str) -> Result<(String, f64), String> {
    let (hash, similarity) = raw
        .rsplit_once('=')
        .ok_or_else(|| format!("expected HASH=SIMILARITY, got '{}'", raw))?;
    let hash = hash.trim();
    if hash.is_empty() {
        return Err(format!("empty hash in '{}'", raw));
    }
    let similarity: f64 = similarity
        .trim()
        .parse()
        .map_err(|e| format!("invalid similarity in '{}': {}", raw, e))?;
    Ok((hash.to_string(), similarity))
}

fn parse_metadata(raw: Option<&str>) -> anyhow::Result<Option<Map<String, Value>>> {
    match raw {
        None => Ok(None),
        Some(raw) => match serde_json::from_str::<Value>(raw).context("metadata is not valid JSON")? {
            Value::Object(map) => Ok(Some(map)),
            Value::Null => Ok(None),
            other => anyhow::bail!("metadata must be a JSON object, got {}", other),
        },
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn require_memory(catalog: &SqliteMemoryCatalog, hash: &str) -> anyhow::Result<MemoryRecord> {
    catalog
        .get_memory(hash)
        .await?
        .with_context(|| format!("memory '{}' not found", hash))
}

// ============================================================================
// Entry point
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let mut config = MnemosConfig::load(&cli.config)
        .with_context(|| format!("failed to load config from {}", cli.config))?;
    if let Some(path) = &cli.db {
        config.database.path = path.clone();
    }

    let default_level = config
        .service
        .log_level
        .parse::<tracing::Level>()
        .unwrap_or(tracing::Level::INFO);
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(default_level.into()))
        .with_writer(std::io::stderr)
        .init();

    if !config.ontology.custom_types.is_empty() {
        ontology::load_custom_types(&config.ontology.custom_types);
    }

    let storage = GraphStorage::open(&config.database)
        .await
        .with_context(|| format!("failed to open database {}", config.database.expanded_path()))?;
    let catalog = SqliteMemoryCatalog::new(storage.pool().clone());
    let graph = &config.graph;

    match cli.command {
        Commands::Init => {
            let version = db::schema_version(storage.pool()).await?;
            tracing::info!(path = %config.database.expanded_path(), version, "Database initialized");
            print_json(&json!({
                "path": config.database.expanded_path(),
                "schema_version": version,
            }))?;
        }
        Commands::Health => {
            let sqlite = db::health_check(storage.pool()).await?;
            let version = db::schema_version(storage.pool()).await?;
            print_json(&json!({
                "status": "ok",
                "sqlite_version": sqlite,
                "schema_version": version,
                "expected_schema_version": db::SCHEMA_VERSION,
            }))?;
        }
        Commands::Types => {
            let relationships: Vec<Value> = RelationshipType::ALL
                .iter()
                .map(|rel| {
                    json!({
                        "name": rel.as_str(),
                        "description": rel.description(),
                        "symmetric": rel.is_symmetric(),
                        "patterns": rel.valid_patterns(),
                    })
                })
                .collect();
            print_json(&json!({
                "taxonomy": ontology::get_taxonomy(),
                "relationships": relationships,
            }))?;
        }
        Commands::Link {
            source,
            target,
            relationship,
            similarity,
            connection_types,
            metadata,
        } => {
            let metadata = parse_metadata(metadata.as_deref())?;
            let stored = storage
                .store_association(
                    &source,
                    &target,
                    similarity,
                    &connection_types,
                    metadata.as_ref(),
                    relationship,
                )
                .await?;
            print_json(&json!({ "stored": stored }))?;
        }
        Commands::Unlink { source, target } => {
            let deleted = storage.delete_association(&source, &target).await?;
            print_json(&json!({ "deleted": deleted }))?;
        }
        Commands::Connected {
            hash,
            max_hops,
            relationship,
            direction,
        } => {
            let max_hops = max_hops.unwrap_or(graph.default_max_hops);
            let connected = storage
                .find_connected(&hash, max_hops, relationship, direction)
                .await?;
            print_json(&connected)?;
        }
        Commands::Path { from, to, max_depth } => {
            let max_depth = max_depth.unwrap_or(graph.default_max_depth);
            let path = storage.shortest_path(&from, &to, max_depth).await?;
            print_json(&json!({ "path": path }))?;
        }
        Commands::Subgraph { center, radius } => {
            let radius = radius.unwrap_or(graph.default_radius);
            print_json(&storage.get_subgraph(&center, radius).await?)?;
        }
        Commands::Count { hash } => {
            let count = storage.get_association_count(&hash).await?;
            print_json(&json!({ "hash": hash, "count": count }))?;
        }
        Commands::Distribution => {
            print_json(&storage.get_relationship_type_distribution().await?)?;
        }
        Commands::Visualize {
            limit,
            min_connections,
        } => {
            let data = storage
                .get_graph_visualization_data(
                    &catalog,
                    limit.unwrap_or(graph.visualization_limit),
                    min_connections.unwrap_or(graph.visualization_min_connections),
                )
                .await?;
            print_json(&data)?;
        }
        Commands::Stats => {
            print_json(&storage.stats().await?)?;
        }
        Commands::Infer { source, target } => {
            let source = require_memory(&catalog, &source).await?;
            let target = require_memory(&catalog, &target).await?;
            let engine = RelationshipInferenceEngine::from_config(&config.inference);
            let inference = engine.infer_relationship_type(
                source.memory_type.as_deref(),
                target.memory_type.as_deref(),
                Some(source.content.as_str()),
                Some(target.content.as_str()),
                source.created_at,
                target.created_at,
                Some(source.tags.as_slice()),
                Some(target.tags.as_slice()),
            )?;
            print_json(&inference)?;
        }
        Commands::Autolink { source, candidates } => {
            let source = require_memory(&catalog, &source).await?;
            let hashes: Vec<String> = candidates.iter().map(|(h, _)| h.clone()).collect();
            let records = catalog.get_memories(&hashes).await?;

            let mut resolved = Vec::with_capacity(candidates.len());
            for (hash, similarity) in candidates {
                match records.get(&hash) {
                    Some(record) => resolved.push((record.clone(), similarity)),
                    None => tracing::warn!(hash = %hash, "Candidate memory not found, skipped"),
                }
            }

            let engine = RelationshipInferenceEngine::from_config(&config.inference);
            let report = link_memory(&storage, &engine, &config.linker, &source, &resolved).await?;
            print_json(&report)?;
        }
        Commands::Causes { hash, max_hops } => {
            let reasoner = SemanticReasoner::new(storage.clone());
            match max_hops {
                Some(max_hops) => print_json(&reasoner.find_causal_chain(&hash, max_hops).await)?,
                None => print_json(&reasoner.find_causes(&hash).await)?,
            }
        }
        Commands::Fixes { hash } => {
            let reasoner = SemanticReasoner::new(storage.clone());
            print_json(&reasoner.find_fixes(&hash).await)?;
        }
        Commands::Contradictions { hash } => {
            let reasoner = SemanticReasoner::new(storage.clone());
            print_json(&reasoner.detect_contradictions(&hash).await)?;
        }
        Commands::Transitive {
            relationship,
            max_hops,
        } => {
            let reasoner = SemanticReasoner::new(storage.clone());
            let max_hops = max_hops.unwrap_or(graph.default_max_hops);
            print_json(&reasoner.infer_transitive(relationship, max_hops).await)?;
        }
        Commands::Suggest { hash, limit } => {
            let reasoner = SemanticReasoner::new(storage.clone());
            let mut suggestions = reasoner.suggest_relationships(&hash).await;
            suggestions.truncate(limit);
            print_json(&suggestions)?;
        }
        Commands::Concept { hash } => {
            let reasoner =
                SemanticReasoner::new(storage.clone()).with_lookup(Arc::new(catalog.clone()));
            let concept = reasoner.abstract_to_concept(&hash).await;
            print_json(&json!({ "hash": hash, "concept": concept }))?;
        }
        Commands::Remember {
            hash,
            content,
            memory_type,
            tags,
            created_at,
        } => {
            let mut record = MemoryRecord::new(hash, content).with_tags(tags);
            if let Some(memory_type) = memory_type {
                record = record.with_type(memory_type);
            }
            if let Some(created_at) = created_at {
                record = record.with_created_at(created_at);
            }
            catalog.insert_memory(&record).await?;
            print_json(&record)?;
        }
    }

    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
