use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct MnemosConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub inference: InferenceConfig,
    #[serde(default)]
    pub graph: GraphConfig,
    #[serde(default)]
    pub linker: LinkerConfig,
    #[serde(default)]
    pub ontology: OntologyConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServiceConfig {
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path to the SQLite file, `~` is expanded. `:memory:` opens a private in-memory database.
    pub path: String,
    pub max_connections: u32,
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "~/.mnemos/graph.db".to_string(),
            max_connections: 4,
            busy_timeout_ms: 5_000,
        }
    }
}

impl DatabaseConfig {
    pub fn in_memory() -> Self {
        Self {
            path: ":memory:".to_string(),
            max_connections: 1,
            busy_timeout_ms: 5_000,
        }
    }

    pub fn is_in_memory(&self) -> bool {
        self.path == ":memory:"
    }

    /// Database path with `~` and environment variables expanded.
    pub fn expanded_path(&self) -> String {
        shellexpand::full(&self.path)
            .map(|p| p.into_owned())
            .unwrap_or_else(|_| shellexpand::tilde(&self.path).into_owned())
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct InferenceConfig {
    pub min_confidence: f64,
    pub weight_type: f64,
    pub weight_content: f64,
    pub weight_temporal: f64,
    pub weight_tags: f64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.6,
            weight_type: 0.40,
            weight_content: 0.35,
            weight_temporal: 0.15,
            weight_tags: 0.10,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GraphConfig {
    pub default_max_hops: u32,
    pub default_max_depth: u32,
    pub default_radius: u32,
    pub visualization_limit: usize,
    pub visualization_min_connections: u64,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            default_max_hops: 2,
            default_max_depth: 5,
            default_radius: 2,
            visualization_limit: 100,
            visualization_min_connections: 1,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LinkerConfig {
    /// Candidates below this similarity are never classified.
    pub min_similarity: f64,
    /// Discovery-method tag recorded on every association the linker writes.
    pub connection_type: String,
}

impl Default for LinkerConfig {
    fn default() -> Self {
        Self {
            min_similarity: 0.5,
            connection_type: "inferred".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct OntologyConfig {
    /// Extra base types and subtypes layered over the built-in taxonomy.
    #[serde(default)]
    pub custom_types: HashMap<String, Vec<String>>,
}

impl MnemosConfig {
    /// Load configuration from a TOML file, overridden by `MNEMOS__SECTION__KEY` env vars.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(Environment::with_prefix("MNEMOS").separator("__"))
            .build()?;
        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        let config = MnemosConfig::default();
        assert!((config.inference.min_confidence - 0.6).abs() < f64::EPSILON);

        let weight_sum = config.inference.weight_type
            + config.inference.weight_content
            + config.inference.weight_temporal
            + config.inference.weight_tags;
        assert!((weight_sum - 1.0).abs() < 1e-9);
        assert_eq!(config.graph.default_max_hops, 2);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let config = MnemosConfig::load("/nonexistent/mnemos-config-for-tests").unwrap();
        assert_eq!(config.database.max_connections, 4);
        assert!(config.ontology.custom_types.is_empty());
    }

    #[test]
    fn test_load_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mnemos.toml");
        std::fs::write(
            &path,
            r#"
[database]
path = "/tmp/graph-test.db"
max_connections = 2
busy_timeout_ms = 100

[inference]
min_confidence = 0.7
weight_type = 0.4
weight_content = 0.35
weight_temporal = 0.15
weight_tags = 0.1

[ontology.custom_types]
legal = ["contract", "precedent"]
"#,
        )
        .unwrap();

        let config = MnemosConfig::load(path.to_str().unwrap()).unwrap();
        assert_eq!(config.database.path, "/tmp/graph-test.db");
        assert_eq!(config.database.max_connections, 2);
        assert!((config.inference.min_confidence - 0.7).abs() < f64::EPSILON);
        assert_eq!(
            config.ontology.custom_types.get("legal"),
            Some(&vec!["contract".to_string(), "precedent".to_string()])
        );
        // Untouched sections fall back to defaults
        assert_eq!(config.graph.visualization_limit, 100);
    }

    #[test]
    fn test_partial_section_keeps_field_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.toml");
        std::fs::write(&path, "[graph]\ndefault_max_hops = 4\n").unwrap();

        let config = MnemosConfig::load(path.to_str().unwrap()).unwrap();
        assert_eq!(config.graph.default_max_hops, 4);
        assert_eq!(config.graph.default_radius, 2);
        assert_eq!(config.linker.connection_type, "inferred");
    }

    #[test]
    fn test_in_memory_database_config() {
        let db = DatabaseConfig::in_memory();
        assert!(db.is_in_memory());
        assert_eq!(db.expanded_path(), ":memory:");
    }
}
