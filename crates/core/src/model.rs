use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Finding domain: Fallacy (F), Bias (B), Rhetorical tactic (R), Manipulation pattern (M)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Domain {
    #[serde(rename = "F", alias = "fallacy", alias = "fallacies")]
    Fallacy,
    #[serde(rename = "B", alias = "bias", alias = "biases")]
    Bias,
    #[serde(rename = "R", alias = "rhetorical_tactic", alias = "rhetorical_tactics")]
    RhetoricalTactic,
    #[serde(rename = "M", alias = "manipulation_pattern", alias = "manipulation_patterns")]
    ManipulationPattern,
}

impl Domain {
    /// All domains in report order
    pub const ALL: [Self; 4] = [
        Self::Fallacy,
        Self::Bias,
        Self::RhetoricalTactic,
        Self::ManipulationPattern,
    ];

    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Fallacy => "F",
            Self::Bias => "B",
            Self::RhetoricalTactic => "R",
            Self::ManipulationPattern => "M",
        }
    }

    /// Key of this domain's entry list in the analyzer payload
    #[must_use]
    pub const fn payload_key(self) -> &'static str {
        match self {
            Self::Fallacy => "fallacies",
            Self::Bias => "biases",
            Self::RhetoricalTactic => "rhetorical_tactics",
            Self::ManipulationPattern => "manipulation_patterns",
        }
    }

    /// Human-readable section label
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Fallacy => "Logical fallacies",
            Self::Bias => "Cognitive biases",
            Self::RhetoricalTactic => "Rhetorical / persuasion tactics",
            Self::ManipulationPattern => "Manipulation patterns",
        }
    }

    /// Parse a code ("F"), singular name ("fallacy") or payload key ("fallacies")
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "f" | "fallacy" | "fallacies" => Some(Self::Fallacy),
            "b" | "bias" | "biases" => Some(Self::Bias),
            "r" | "rhetorical_tactic" | "rhetorical_tactics" => Some(Self::RhetoricalTactic),
            "m" | "manipulation_pattern" | "manipulation_patterns" => {
                Some(Self::ManipulationPattern)
            }
            _ => None,
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Closed-set qualitative strength label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    /// Case-insensitive parse; anything outside the closed set is `None`
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" | "moderate" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One validated finding tied to a chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub domain: Domain,
    pub type_name: String,
    pub rationale: String,
    pub severity: Option<Severity>,
    pub source_chunk_index: usize,
}

/// One claim from a chunk's argument map, carried through unchanged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgumentMapEntry {
    pub chunk_index: usize,
    pub claim_text: String,
    pub is_assumption: bool,
}

/// 1–5 reasoning-quality rating for one chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RationalityRating {
    pub chunk_index: usize,
    pub overall_score: f64,
    #[serde(default)]
    pub per_dimension_scores: BTreeMap<String, f64>,
}

/// Lowest and highest allowed rating
pub const SCORE_RANGE: (f64, f64) = (1.0, 5.0);

#[must_use]
pub fn score_in_range(score: f64) -> bool {
    score.is_finite() && score >= SCORE_RANGE.0 && score <= SCORE_RANGE.1
}

/// What went wrong with one part of a raw payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// Entry missing `name` or `rationale`, or not an object
    MalformedEntry,
    /// Severity outside {Low, Medium, High}; coerced to null
    InvalidSeverity,
    /// No rationality rating in the payload
    MissingRating,
    /// Rating present but unusable (non-numeric or out of range)
    InvalidRating,
    /// One per-dimension score dropped
    InvalidDimensionScore,
    /// Argument-map entry without claim text
    MalformedClaim,
}

/// Recoverable validation problem, recorded instead of failing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationWarning {
    pub chunk_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<Domain>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_index: Option<usize>,
    pub kind: WarningKind,
    pub message: String,
}

/// Validated output for one chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationSet {
    pub chunk_index: usize,

    /// Chunk length in characters (weight for length-weighted fusion)
    pub chunk_chars: usize,

    pub annotations: Vec<Annotation>,
    pub argument_map: Vec<ArgumentMapEntry>,

    /// Absent when the payload had no usable rating; never defaulted
    pub rating: Option<RationalityRating>,

    pub warnings: Vec<ValidationWarning>,
}

impl AnnotationSet {
    #[must_use]
    pub fn empty(chunk_index: usize, chunk_chars: usize) -> Self {
        Self {
            chunk_index,
            chunk_chars,
            annotations: Vec::new(),
            argument_map: Vec::new(),
            rating: None,
            warnings: Vec::new(),
        }
    }
}

/// A chunk whose analysis could not be obtained after retries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DegradedChunk {
    pub chunk_index: usize,
    pub attempts: u32,
    pub reason: String,
}

/// Final state of one chunk in a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChunkOutcome {
    Analyzed(AnnotationSet),
    Degraded(DegradedChunk),
}

impl ChunkOutcome {
    #[must_use]
    pub const fn chunk_index(&self) -> usize {
        match self {
            Self::Analyzed(set) => set.chunk_index,
            Self::Degraded(d) => d.chunk_index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_parse_accepts_codes_and_names() {
        assert_eq!(Domain::parse("F"), Some(Domain::Fallacy));
        assert_eq!(Domain::parse("fallacies"), Some(Domain::Fallacy));
        assert_eq!(Domain::parse("Fallacy"), Some(Domain::Fallacy));
        assert_eq!(Domain::parse("biases"), Some(Domain::Bias));
        assert_eq!(Domain::parse("bias"), Some(Domain::Bias));
        assert_eq!(Domain::parse("rhetorical_tactic"), Some(Domain::RhetoricalTactic));
        assert_eq!(Domain::parse("m"), Some(Domain::ManipulationPattern));
        assert_eq!(Domain::parse("vibes"), None);
    }

    #[test]
    fn domain_serializes_as_code() {
        let json = serde_json::to_string(&Domain::RhetoricalTactic).expect("serialize");
        assert_eq!(json, "\"R\"");
        let back: Domain = serde_json::from_str("\"manipulation_patterns\"").expect("alias");
        assert_eq!(back, Domain::ManipulationPattern);
    }

    #[test]
    fn severity_parse_is_closed_set() {
        assert_eq!(Severity::parse(" HIGH "), Some(Severity::High));
        assert_eq!(Severity::parse("moderate"), Some(Severity::Medium));
        assert_eq!(Severity::parse("critical"), None);
        assert!(Severity::Low < Severity::High);
        assert!(None < Some(Severity::Low));
    }

    #[test]
    fn score_range_is_inclusive() {
        assert!(score_in_range(1.0));
        assert!(score_in_range(5.0));
        assert!(!score_in_range(0.9));
        assert!(!score_in_range(f64::NAN));
    }
}
