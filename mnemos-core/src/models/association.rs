use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::MnemosError;
use crate::ontology::RelationshipType;

/// A stored, typed, directed connection between two memory content hashes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Association {
    pub source_hash: String,
    pub target_hash: String,
    pub similarity: f64,
    pub connection_types: Vec<String>,
    pub metadata: Map<String, Value>,
    pub created_at: f64,
    /// `None` for legacy, untyped rows.
    pub relationship_type: Option<RelationshipType>,
}

/// Raw `memory_graph` row as SQLite returns it.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AssociationRow {
    pub source_hash: String,
    pub target_hash: String,
    pub similarity: f64,
    pub connection_types: Option<String>,
    pub metadata: Option<String>,
    pub created_at: f64,
    pub relationship_type: Option<String>,
}

impl TryFrom<AssociationRow> for Association {
    type Error = MnemosError;

    fn try_from(row: AssociationRow) -> Result<Self, Self::Error> {
        let connection_types = match row.connection_types.as_deref() {
            None | Some("") => Vec::new(),
            Some(raw) => serde_json::from_str(raw)?,
        };

        let metadata = match row.metadata.as_deref() {
            None | Some("") | Some("null") => Map::new(),
            Some(raw) => match serde_json::from_str::<Value>(raw)? {
                Value::Object(map) => map,
                Value::Null => Map::new(),
                other => {
                    return Err(MnemosError::Other(format!(
                        "association metadata must be a JSON object, got {}",
                        other
                    )))
                }
            },
        };

        let relationship_type = match row.relationship_type.as_deref() {
            None | Some("") => None,
            Some(raw) => Some(raw.parse::<RelationshipType>()?),
        };

        Ok(Association {
            source_hash: row.source_hash,
            target_hash: row.target_hash,
            similarity: row.similarity,
            connection_types,
            metadata,
            created_at: row.created_at,
            relationship_type,
        })
    }
}

/// Which stored direction a traversal follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Outgoing,
    Incoming,
    #[default]
    Both,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Outgoing => "outgoing",
            Direction::Incoming => "incoming",
            Direction::Both => "both",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = MnemosError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "outgoing" | "out" => Ok(Direction::Outgoing),
            "incoming" | "in" => Ok(Direction::Incoming),
            "both" => Ok(Direction::Both),
            other => Err(MnemosError::InvalidInput(format!(
                "direction must be outgoing, incoming or both, got '{}'",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> AssociationRow {
        AssociationRow {
            source_hash: "a".to_string(),
            target_hash: "b".to_string(),
            similarity: 0.7,
            connection_types: Some(r#"["semantic","temporal"]"#.to_string()),
            metadata: None,
            created_at: 1_700_000_000.5,
            relationship_type: Some("causes".to_string()),
        }
    }

    #[test]
    fn test_row_conversion_normalizes_null_metadata() {
        let association = Association::try_from(row()).unwrap();
        assert!(association.metadata.is_empty());
        assert_eq!(association.connection_types, vec!["semantic", "temporal"]);
        assert_eq!(association.relationship_type, Some(RelationshipType::Causes));
    }

    #[test]
    fn test_row_conversion_untyped_legacy_row() {
        let mut legacy = row();
        legacy.relationship_type = None;
        legacy.connection_types = None;
        let association = Association::try_from(legacy).unwrap();
        assert_eq!(association.relationship_type, None);
        assert!(association.connection_types.is_empty());
    }

    #[test]
    fn test_row_conversion_rejects_corrupted_type() {
        let mut corrupted = row();
        corrupted.relationship_type = Some("blames".to_string());
        assert!(matches!(
            Association::try_from(corrupted),
            Err(MnemosError::UnknownRelationship(_))
        ));
    }

    #[test]
    fn test_row_conversion_rejects_non_object_metadata() {
        let mut corrupted = row();
        corrupted.metadata = Some("[1,2]".to_string());
        assert!(Association::try_from(corrupted).is_err());
    }

    #[test]
    fn test_direction_parse() {
        assert_eq!("OUT".parse::<Direction>().unwrap(), Direction::Outgoing);
        assert_eq!("incoming".parse::<Direction>().unwrap(), Direction::Incoming);
        assert_eq!(Direction::default(), Direction::Both);
        assert!("sideways".parse::<Direction>().is_err());
    }
}
