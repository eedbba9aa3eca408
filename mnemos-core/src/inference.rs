//! Relationship inference: classify a candidate memory pair
//!
//! Given two memories that are not yet connected, decide which relationship type
//! links them and how confident we are. Four independent signals each vote a
//! score in [0, 1] per relationship type:
//! - **Type combination**: ontology patterns plus strong priors for specific pairs
//!   (a learning next to an error is very likely a fix)
//! - **Content cues**: resolution, causation, contradiction, confirmation and
//!   sequence vocabulary, plus negation of a claim the other memory makes
//! - **Temporal proximity**: close timestamps favour `causes` / `follows`
//! - **Tag overlap**: Jaccard overlap raises every type equally
//!
//! Final score per type = Σ weight_i × vote_i. The best specific type wins if it
//! clears `min_confidence`, otherwise the pair falls back to `related`.

use std::collections::{BTreeMap, HashSet};

use regex::Regex;
use serde::Serialize;

use crate::config::InferenceConfig;
use crate::error::{MnemosError, Result};
use crate::models::MemoryRecord;
use crate::ontology::{get_parent_type, is_valid_pattern, RelationshipType};

/// Default confidence a specific type must reach before it beats `related`.
pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.6;

const ONE_HOUR: f64 = 3_600.0;
const ONE_DAY: f64 = 86_400.0;
const ONE_WEEK: f64 = 604_800.0;

/// Cue hits beyond this do not raise the content vote further.
const MAX_CUE_HITS: usize = 3;

/// Minimum token length for the shared-claim check behind negation detection.
const MIN_CLAIM_TOKEN_LEN: usize = 4;

/// Per-type votes from one signal.
pub type Votes = BTreeMap<RelationshipType, f64>;

/// Everything the engine looks at for one ordered pair.
#[derive(Debug, Clone, Copy)]
pub struct CandidatePair<'a> {
    pub source_type: Option<&'a str>,
    pub target_type: Option<&'a str>,
    pub source_content: &'a str,
    pub target_content: &'a str,
    pub source_timestamp: f64,
    pub target_timestamp: f64,
    pub source_tags: &'a [String],
    pub target_tags: &'a [String],
}

impl<'a> CandidatePair<'a> {
    pub fn from_records(source: &'a MemoryRecord, target: &'a MemoryRecord) -> Self {
        Self {
            source_type: source.memory_type.as_deref(),
            target_type: target.memory_type.as_deref(),
            source_content: &source.content,
            target_content: &target.content,
            source_timestamp: source.created_at,
            target_timestamp: target.created_at,
            source_tags: &source.tags,
            target_tags: &target.tags,
        }
    }
}

/// One scoring strategy. Strategies never fail; no signal means no votes.
pub trait SignalStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn vote(&self, pair: &CandidatePair<'_>) -> Votes;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalContribution {
    pub signal: &'static str,
    pub weight: f64,
    pub vote: f64,
}

/// Classification outcome. `contributions` explains the chosen type's score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Inference {
    pub relationship_type: RelationshipType,
    pub confidence: f64,
    pub contributions: Vec<SignalContribution>,
}

// ============================================================================
// Signal: type combination
// ============================================================================

/// Strong priors for specific `(source base, target base)` pairs.
const TYPE_PRIORS: &[(&str, &str, RelationshipType, f64)] = &[
    ("learning", "error", RelationshipType::Fixes, 1.0),
    ("decision", "error", RelationshipType::Fixes, 0.8),
    ("decision", "error", RelationshipType::Causes, 0.5),
    ("error", "error", RelationshipType::Causes, 0.6),
    ("error", "error", RelationshipType::Fixes, 0.7),
    ("observation", "error", RelationshipType::Causes, 0.7),
    ("observation", "learning", RelationshipType::Supports, 0.7),
    ("observation", "decision", RelationshipType::Supports, 0.6),
    ("research", "decision", RelationshipType::Supports, 0.7),
    ("research", "learning", RelationshipType::Supports, 0.7),
    ("learning", "decision", RelationshipType::Supports, 0.6),
];

/// Vote given to any relationship whose ontology pattern matches the pair.
const PATTERN_MATCH_VOTE: f64 = 0.5;

#[derive(Debug, Default)]
pub struct TypeCombinationSignal;

impl SignalStrategy for TypeCombinationSignal {
    fn name(&self) -> &'static str {
        "type_combination"
    }

    fn vote(&self, pair: &CandidatePair<'_>) -> Votes {
        let mut votes = Votes::new();
        votes.insert(RelationshipType::Related, PATTERN_MATCH_VOTE);

        let (Some(source_type), Some(target_type)) = (pair.source_type, pair.target_type) else {
            return votes;
        };

        for rel in RelationshipType::ALL {
            if rel != RelationshipType::Related && is_valid_pattern(rel, source_type, target_type) {
                votes.insert(rel, PATTERN_MATCH_VOTE);
            }
        }

        let source_base = get_parent_type(source_type);
        let target_base = get_parent_type(target_type);
        if let (Some(source_base), Some(target_base)) = (source_base, target_base) {
            for (s, t, rel, prior) in TYPE_PRIORS {
                if *s == source_base && *t == target_base {
                    let entry = votes.entry(*rel).or_insert(0.0);
                    *entry = entry.max(*prior);
                }
            }
        }

        votes
    }
}

// ============================================================================
// Signal: content cues
// ============================================================================

const CUE_PATTERNS: &[(RelationshipType, &str)] = &[
    (
        RelationshipType::Fixes,
        r"(?i)\b(fix|fixes|fixed|fixing|resolve[sd]?|resolving|solve[sd]?|solving|solution|workaround|patch(es|ed)?|repair(s|ed)?|corrected|mitigat(e[sd]?|ion))\b",
    ),
    (
        RelationshipType::Causes,
        r"(?i)\b(cause[sd]?|causing|led to|leads? to|result(s|ed)? in|because|due to|trigger(s|ed)?|root cause|broke|breaks)\b",
    ),
    (
        RelationshipType::Contradicts,
        r"(?i)\b(however|contradicts?|contradicted|contrary|incorrect|wrong|not true|disagree[sd]?|inconsistent|no longer)\b",
    ),
    (
        RelationshipType::Supports,
        r"(?i)\b(confirm(s|ed)?|support(s|ed)?|validate[sd]?|validation|evidence|consistent with|agrees? with|corroborate[sd]?)\b",
    ),
    (
        RelationshipType::Follows,
        r"(?i)\b(then|afterwards?|next|subsequently|followed by|later|following|previously)\b",
    ),
];

const NEGATION_PATTERN: &str =
    r"(?i)\b(not|never|no|isn't|isn’t|doesn't|doesn’t|don't|don’t|cannot|can't|won't|wasn't|aren't)\b";

/// Added to the contradiction vote when exactly one side negates a shared claim.
const NEGATION_BONUS: f64 = 0.5;

pub struct ContentCueSignal {
    cues: Vec<(RelationshipType, Regex)>,
    negation: Option<Regex>,
}

impl ContentCueSignal {
    pub fn new() -> Self {
        let cues = CUE_PATTERNS
            .iter()
            .filter_map(|(rel, pattern)| match Regex::new(pattern) {
                Ok(re) => Some((*rel, re)),
                Err(e) => {
                    tracing::error!(relationship = %rel, error = %e, "Invalid cue pattern, signal disabled");
                    None
                }
            })
            .collect();

        Self {
            cues,
            negation: Regex::new(NEGATION_PATTERN).ok(),
        }
    }

    fn hit_vote(hits: usize) -> f64 {
        match hits {
            0 => 0.0,
            1 => 0.7,
            2 => 0.85,
            _ => 1.0,
        }
    }

    /// One side negates while both talk about the same thing.
    fn negates_shared_claim(&self, source: &str, target: &str) -> bool {
        let Some(negation) = &self.negation else {
            return false;
        };
        if negation.is_match(source) == negation.is_match(target) {
            return false;
        }
        let source_tokens = claim_tokens(source);
        let target_tokens = claim_tokens(target);
        source_tokens.intersection(&target_tokens).take(2).count() >= 2
    }
}

impl Default for ContentCueSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalStrategy for ContentCueSignal {
    fn name(&self) -> &'static str {
        "content_cues"
    }

    fn vote(&self, pair: &CandidatePair<'_>) -> Votes {
        let mut votes = Votes::new();

        for (rel, re) in &self.cues {
            let hits = re
                .find_iter(pair.source_content)
                .chain(re.find_iter(pair.target_content))
                .take(MAX_CUE_HITS)
                .count();
            let vote = Self::hit_vote(hits);
            if vote > 0.0 {
                votes.insert(*rel, vote);
            }
        }

        if self.negates_shared_claim(pair.source_content, pair.target_content) {
            let entry = votes.entry(RelationshipType::Contradicts).or_insert(0.0);
            *entry = (*entry + NEGATION_BONUS).min(1.0);
        }

        votes
    }
}

fn claim_tokens(content: &str) -> HashSet<String> {
    content
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= MIN_CLAIM_TOKEN_LEN)
        .map(str::to_lowercase)
        .collect()
}

// ============================================================================
// Signal: temporal proximity
// ============================================================================

#[derive(Debug, Default)]
pub struct TemporalSignal;

impl TemporalSignal {
    fn proximity(gap_seconds: f64) -> f64 {
        if !gap_seconds.is_finite() {
            0.0
        } else if gap_seconds <= ONE_HOUR {
            1.0
        } else if gap_seconds <= ONE_DAY {
            0.7
        } else if gap_seconds <= ONE_WEEK {
            0.4
        } else {
            0.0
        }
    }
}

impl SignalStrategy for TemporalSignal {
    fn name(&self) -> &'static str {
        "temporal"
    }

    fn vote(&self, pair: &CandidatePair<'_>) -> Votes {
        let mut votes = Votes::new();
        let delta = pair.target_timestamp - pair.source_timestamp;
        let proximity = Self::proximity(delta.abs());
        if proximity == 0.0 {
            return votes;
        }

        // A cause precedes its effect; a follower comes after what it follows
        let causes = if delta >= 0.0 { proximity } else { proximity * 0.5 };
        let follows = if delta <= 0.0 { proximity } else { proximity * 0.5 };
        votes.insert(RelationshipType::Causes, causes);
        votes.insert(RelationshipType::Follows, follows);
        votes
    }
}

// ============================================================================
// Signal: tag overlap
// ============================================================================

#[derive(Debug, Default)]
pub struct TagOverlapSignal;

impl TagOverlapSignal {
    pub fn jaccard(source: &[String], target: &[String]) -> f64 {
        let normalize = |tags: &[String]| -> HashSet<String> {
            tags.iter()
                .map(|t| t.trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .collect()
        };
        let a = normalize(source);
        let b = normalize(target);
        if a.is_empty() || b.is_empty() {
            return 0.0;
        }
        let shared = a.intersection(&b).count() as f64;
        let union = a.union(&b).count() as f64;
        shared / union
    }
}

impl SignalStrategy for TagOverlapSignal {
    fn name(&self) -> &'static str {
        "tag_overlap"
    }

    fn vote(&self, pair: &CandidatePair<'_>) -> Votes {
        let overlap = Self::jaccard(pair.source_tags, pair.target_tags);
        if overlap == 0.0 {
            return Votes::new();
        }
        RelationshipType::ALL.iter().map(|rel| (*rel, overlap)).collect()
    }
}

// ============================================================================
// Engine
// ============================================================================

pub struct RelationshipInferenceEngine {
    min_confidence: f64,
    signals: Vec<(Box<dyn SignalStrategy>, f64)>,
}

impl RelationshipInferenceEngine {
    /// Engine with the default signal weights.
    pub fn new(min_confidence: f64) -> Self {
        Self::from_config(&InferenceConfig {
            min_confidence,
            ..InferenceConfig::default()
        })
    }

    pub fn from_config(config: &InferenceConfig) -> Self {
        let signals: Vec<(Box<dyn SignalStrategy>, f64)> = vec![
            (Box::new(TypeCombinationSignal), config.weight_type),
            (Box::new(ContentCueSignal::new()), config.weight_content),
            (Box::new(TemporalSignal), config.weight_temporal),
            (Box::new(TagOverlapSignal), config.weight_tags),
        ];
        Self::with_signals(config.min_confidence, signals)
    }

    /// Engine over a custom ordered set of weighted strategies.
    pub fn with_signals(min_confidence: f64, signals: Vec<(Box<dyn SignalStrategy>, f64)>) -> Self {
        Self {
            min_confidence: if min_confidence.is_finite() {
                min_confidence.clamp(0.0, 1.0)
            } else {
                DEFAULT_MIN_CONFIDENCE
            },
            signals,
        }
    }

    pub fn min_confidence(&self) -> f64 {
        self.min_confidence
    }

    /// Classify a pair from raw fields.
    ///
    /// Empty content is valid input. Absent content (`None`) is rejected with
    /// `InvalidInput` rather than being coerced to an empty string.
    #[allow(clippy::too_many_arguments)]
    pub fn infer_relationship_type(
        &self,
        source_type: Option<&str>,
        target_type: Option<&str>,
        source_content: Option<&str>,
        target_content: Option<&str>,
        source_timestamp: f64,
        target_timestamp: f64,
        source_tags: Option<&[String]>,
        target_tags: Option<&[String]>,
    ) -> Result<Inference> {
        let source_content = source_content
            .ok_or_else(|| MnemosError::InvalidInput("source content is missing".to_string()))?;
        let target_content = target_content
            .ok_or_else(|| MnemosError::InvalidInput("target content is missing".to_string()))?;

        let pair = CandidatePair {
            source_type,
            target_type,
            source_content,
            target_content,
            source_timestamp,
            target_timestamp,
            source_tags: source_tags.unwrap_or_default(),
            target_tags: target_tags.unwrap_or_default(),
        };
        Ok(self.classify(&pair))
    }

    /// Classify two memory records, source first.
    pub fn infer(&self, source: &MemoryRecord, target: &MemoryRecord) -> Inference {
        self.classify(&CandidatePair::from_records(source, target))
    }

    pub fn classify(&self, pair: &CandidatePair<'_>) -> Inference {
        let ballots: Vec<(&'static str, f64, Votes)> = self
            .signals
            .iter()
            .map(|(signal, weight)| (signal.name(), *weight, signal.vote(pair)))
            .collect();

        let score_of = |rel: RelationshipType| -> f64 {
            let total: f64 = ballots
                .iter()
                .map(|(_, weight, votes)| weight * votes.get(&rel).copied().unwrap_or(0.0))
                .sum();
            if total.is_finite() {
                total.clamp(0.0, 1.0)
            } else {
                0.0
            }
        };

        // Ties resolve in registry order
        let mut best: Option<(RelationshipType, f64)> = None;
        for rel in RelationshipType::ALL {
            if rel == RelationshipType::Related {
                continue;
            }
            let score = score_of(rel);
            if best.map(|(_, s)| score > s).unwrap_or(true) {
                best = Some((rel, score));
            }
        }

        let (relationship_type, confidence) = match best {
            Some((rel, score)) if score >= self.min_confidence && score > 0.0 => (rel, score),
            _ => (RelationshipType::Related, score_of(RelationshipType::Related)),
        };

        let contributions = ballots
            .iter()
            .map(|(signal, weight, votes)| SignalContribution {
                signal: *signal,
                weight: *weight,
                vote: votes.get(&relationship_type).copied().unwrap_or(0.0),
            })
            .collect();

        tracing::debug!(
            relationship = %relationship_type,
            confidence,
            "Inferred relationship"
        );

        Inference {
            relationship_type,
            confidence,
            contributions,
        }
    }
}

impl Default for RelationshipInferenceEngine {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_CONFIDENCE)
    }
}

// ============================================================================
// TESTS
// ============================================================================
