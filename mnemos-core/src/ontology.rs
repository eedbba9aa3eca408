//! Ontology: memory type taxonomy and relationship registry
//!
//! Single source of truth for:
//! - the two-level memory type taxonomy (base type → subtypes)
//! - the six relationship types, their descriptions and valid type patterns
//! - symmetry rules used by graph storage to decide how many rows to write
//!
//! The taxonomy is process-wide state built once from the built-in table plus an
//! optional operator-supplied extension (`[ontology] custom_types` in the config
//! file or the `MNEMOS_CUSTOM_MEMORY_TYPES` env var). Accessors are memoized;
//! `reset_ontology_cache` drops the cached registry for test isolation.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::error::MnemosError;

/// Env var holding a JSON object of extra types: `{"legal": ["contract", "precedent"]}`.
pub const CUSTOM_TYPES_ENV: &str = "MNEMOS_CUSTOM_MEMORY_TYPES";

/// Pattern wildcard matching any memory type.
pub const WILDCARD: &str = "any";

/// Built-in taxonomy. Subtypes are globally unique.
const BUILTIN_TAXONOMY: &[(&str, &[&str])] = &[
    (
        "observation",
        &["code_edit", "file_access", "search", "command", "conversation", "document", "note", "reference"],
    ),
    ("decision", &["architecture", "tool_choice", "approach", "configuration"]),
    ("learning", &["insight", "best_practice", "anti_pattern", "gotcha"]),
    ("error", &["bug", "failure", "exception", "timeout"]),
    ("pattern", &["recurring_issue", "code_smell", "design_pattern", "workflow"]),
    (
        "planning",
        &["sprint_goal", "backlog_item", "story_point_estimate", "velocity", "retrospective", "standup_note", "acceptance_criteria"],
    ),
    (
        "ceremony",
        &["sprint_review", "sprint_planning", "daily_standup", "retrospective_action", "demo_feedback"],
    ),
    (
        "milestone",
        &["deliverable", "dependency", "risk", "constraint", "assumption", "deadline"],
    ),
    (
        "stakeholder",
        &["requirement", "feedback", "escalation", "approval", "change_request", "status_update"],
    ),
    ("meeting", &["action_item", "attendee_note", "agenda_item", "follow_up", "minutes"]),
    ("research", &["finding", "comparison", "recommendation", "source", "hypothesis"]),
    ("communication", &["email", "chat", "announcement", "request", "response"]),
];

// ============================================================================
// Relationship registry
// ============================================================================

/// The six relationship types an association can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationshipType {
    Causes,
    Fixes,
    Contradicts,
    Supports,
    Follows,
    Related,
}

impl RelationshipType {
    pub const ALL: [RelationshipType; 6] = [
        RelationshipType::Causes,
        RelationshipType::Fixes,
        RelationshipType::Contradicts,
        RelationshipType::Supports,
        RelationshipType::Follows,
        RelationshipType::Related,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipType::Causes => "causes",
            RelationshipType::Fixes => "fixes",
            RelationshipType::Contradicts => "contradicts",
            RelationshipType::Supports => "supports",
            RelationshipType::Follows => "follows",
            RelationshipType::Related => "related",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            RelationshipType::Causes => "Source memory caused or led to the target memory",
            RelationshipType::Fixes => "Source memory resolves the problem described by the target",
            RelationshipType::Contradicts => "The two memories make incompatible claims",
            RelationshipType::Supports => "Source memory is evidence for the target memory",
            RelationshipType::Follows => "Source memory comes after the target in a sequence",
            RelationshipType::Related => "General association with no stronger semantics",
        }
    }

    /// Symmetric relationships are stored as two directed rows.
    pub fn is_symmetric(&self) -> bool {
        matches!(self, RelationshipType::Related | RelationshipType::Contradicts)
    }

    /// Valid `(source base type, target base type)` patterns.
    pub fn valid_patterns(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            RelationshipType::Causes => &[
                ("observation", "error"),
                ("decision", "error"),
                ("error", "error"),
                ("pattern", "error"),
                ("decision", "observation"),
                ("error", "observation"),
            ],
            RelationshipType::Fixes => &[
                ("learning", "error"),
                ("decision", "error"),
                ("pattern", "error"),
                ("observation", "error"),
                ("error", "error"),
            ],
            RelationshipType::Contradicts => &[
                ("observation", "observation"),
                ("learning", "learning"),
                ("decision", "decision"),
                ("research", "research"),
                ("pattern", "pattern"),
                ("learning", "observation"),
            ],
            RelationshipType::Supports => &[
                ("observation", "learning"),
                ("observation", "decision"),
                ("learning", "decision"),
                ("research", "decision"),
                ("research", "learning"),
                ("pattern", "learning"),
            ],
            RelationshipType::Follows => &[
                ("decision", "decision"),
                ("observation", "observation"),
                ("learning", "error"),
                ("planning", "meeting"),
                ("milestone", "planning"),
                ("planning", "ceremony"),
            ],
            RelationshipType::Related => &[(WILDCARD, WILDCARD)],
        }
    }
}

impl fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationshipType {
    type Err = MnemosError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "causes" => Ok(RelationshipType::Causes),
            "fixes" => Ok(RelationshipType::Fixes),
            "contradicts" => Ok(RelationshipType::Contradicts),
            "supports" => Ok(RelationshipType::Supports),
            "follows" => Ok(RelationshipType::Follows),
            "related" => Ok(RelationshipType::Related),
            other => Err(MnemosError::UnknownRelationship(other.to_string())),
        }
    }
}

pub fn validate_relationship(relationship_type: &str) -> bool {
    relationship_type.parse::<RelationshipType>().is_ok()
}

/// `related` and `contradicts` are symmetric. Unknown types are an error, never `false`.
pub fn is_symmetric_relationship(relationship_type: &str) -> Result<bool, MnemosError> {
    relationship_type
        .parse::<RelationshipType>()
        .map(|r| r.is_symmetric())
}

/// Whether `relationship` is allowed between the two memory types.
/// Subtypes are resolved to their base type before matching.
pub fn is_valid_pattern(relationship: RelationshipType, source_type: &str, target_type: &str) -> bool {
    let source = get_parent_type(source_type);
    let target = get_parent_type(target_type);

    relationship.valid_patterns().iter().any(|(s, t)| {
        let source_ok = *s == WILDCARD || source.as_deref() == Some(*s);
        let target_ok = *t == WILDCARD || target.as_deref() == Some(*t);
        source_ok && target_ok
    })
}

// ============================================================================
// Memory type registry
// ============================================================================

#[derive(Debug)]
struct TypeRegistry {
    taxonomy: BTreeMap<String, BTreeSet<String>>,
    parents: HashMap<String, String>,
    all_types: Arc<HashSet<String>>,
    custom_applied: bool,
}

impl TypeRegistry {
    fn build(custom: &HashMap<String, Vec<String>>, custom_applied: bool) -> Self {
        let mut taxonomy: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        let mut parents: HashMap<String, String> = HashMap::new();

        for (base, subtypes) in BUILTIN_TAXONOMY {
            parents.insert(base.to_string(), base.to_string());
            let entry = taxonomy.entry(base.to_string()).or_default();
            for sub in subtypes.iter() {
                entry.insert(sub.to_string());
                parents.insert(sub.to_string(), base.to_string());
            }
        }

        // Deterministic merge order so conflicts resolve the same way every run
        let mut custom_bases: Vec<&String> = custom.keys().collect();
        custom_bases.sort();

        for raw_base in custom_bases {
            let base = raw_base.trim().to_lowercase();
            if base.is_empty() {
                continue;
            }
            match parents.get(&base) {
                Some(parent) if parent != &base => {
                    tracing::warn!(base = %base, parent = %parent, "Custom base type is already a subtype, skipping");
                    continue;
                }
                Some(_) => {}
                None => {
                    parents.insert(base.clone(), base.clone());
                }
            }

            let entry = taxonomy.entry(base.clone()).or_default();
            for raw_sub in custom.get(raw_base).map(Vec::as_slice).unwrap_or_default() {
                let sub = raw_sub.trim().to_lowercase();
                if sub.is_empty() || sub == base {
                    continue;
                }
                match parents.get(&sub) {
                    Some(parent) if parent == &base && sub != base => {}
                    Some(parent) => {
                        tracing::warn!(subtype = %sub, owner = %parent, requested = %base, "Custom subtype already registered elsewhere, skipping");
                    }
                    None => {
                        entry.insert(sub.clone());
                        parents.insert(sub, base.clone());
                    }
                }
            }
        }

        let all_types: HashSet<String> = parents.keys().cloned().collect();

        Self {
            taxonomy,
            parents,
            all_types: Arc::new(all_types),
            custom_applied,
        }
    }

    fn parent_of(&self, memory_type: &str) -> Option<String> {
        let normalized = memory_type.trim().to_lowercase();
        if let Some((base, sub)) = normalized.split_once('/') {
            return match self.parents.get(sub) {
                Some(parent) if parent == base => Some(parent.clone()),
                _ => None,
            };
        }
        self.parents.get(&normalized).cloned()
    }
}

static REGISTRY: RwLock<Option<Arc<TypeRegistry>>> = RwLock::new(None);

fn registry() -> Arc<TypeRegistry> {
    {
        let guard = REGISTRY.read().unwrap_or_else(|e| e.into_inner());
        if let Some(registry) = guard.as_ref() {
            return Arc::clone(registry);
        }
    }

    let mut guard = REGISTRY.write().unwrap_or_else(|e| e.into_inner());
    if let Some(registry) = guard.as_ref() {
        return Arc::clone(registry);
    }
    let registry = Arc::new(TypeRegistry::build(&custom_types_from_env(), false));
    *guard = Some(Arc::clone(&registry));
    registry
}

fn custom_types_from_env() -> HashMap<String, Vec<String>> {
    match std::env::var(CUSTOM_TYPES_ENV) {
        Ok(raw) if !raw.trim().is_empty() => parse_custom_types(&raw),
        _ => HashMap::new(),
    }
}

/// Parse a `{"base": ["sub", ...]}` payload. Malformed input yields an empty map.
pub fn parse_custom_types(raw: &str) -> HashMap<String, Vec<String>> {
    match serde_json::from_str::<HashMap<String, Vec<String>>>(raw) {
        Ok(map) => map,
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring malformed custom memory type configuration");
            HashMap::new()
        }
    }
}

/// Merge operator-supplied types over the built-ins. Applies once per process
/// (or per `reset_ontology_cache`); later calls are ignored and return `false`.
pub fn load_custom_types(custom: &HashMap<String, Vec<String>>) -> bool {
    let mut guard = REGISTRY.write().unwrap_or_else(|e| e.into_inner());
    if guard.as_ref().map(|r| r.custom_applied).unwrap_or(false) {
        tracing::debug!("Custom memory types already applied, ignoring reload");
        return false;
    }

    let mut merged = custom_types_from_env();
    for (base, subs) in custom {
        merged.entry(base.clone()).or_default().extend(subs.iter().cloned());
    }

    let registry = TypeRegistry::build(&merged, true);
    tracing::info!(
        base_types = registry.taxonomy.len(),
        total_types = registry.all_types.len(),
        "Memory type ontology initialized"
    );
    *guard = Some(Arc::new(registry));
    true
}

/// Drop the memoized registry. Next access rebuilds from the built-ins.
pub fn reset_ontology_cache() {
    let mut guard = REGISTRY.write().unwrap_or_else(|e| e.into_inner());
    *guard = None;
}

/// True iff `memory_type` is a base type, a registered subtype, or `base/subtype`.
pub fn validate_memory_type(memory_type: &str) -> bool {
    registry().parent_of(memory_type).is_some()
}

/// Base types map to themselves, subtypes to their owner, unknown types to `None`.
pub fn get_parent_type(memory_type: &str) -> Option<String> {
    registry().parent_of(memory_type)
}

/// Union of base types and subtypes (memoized).
pub fn get_all_types() -> Arc<HashSet<String>> {
    Arc::clone(&registry().all_types)
}

pub fn get_base_types() -> Vec<String> {
    registry().taxonomy.keys().cloned().collect()
}

pub fn get_subtypes(base_type: &str) -> Vec<String> {
    registry()
        .taxonomy
        .get(&base_type.trim().to_lowercase())
        .map(|subs| subs.iter().cloned().collect())
        .unwrap_or_default()
}

/// Full taxonomy, base type → sorted subtypes.
pub fn get_taxonomy() -> BTreeMap<String, Vec<String>> {
    registry()
        .taxonomy
        .iter()
        .map(|(base, subs)| (base.clone(), subs.iter().cloned().collect()))
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================
