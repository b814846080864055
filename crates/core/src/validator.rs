//! Annotation Validator: the single gate between raw analyzer output and the
//! aggregation engine.
//!
//! Validation is pure. The same chunk and payload always produce the same
//! [`AnnotationSet`] and the same warnings. Per-entry problems are recorded
//! as warnings and never abort the chunk; only a structurally incompatible
//! payload is an error.

use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

use reasonscan_chunker::TranscriptChunk;

use crate::aliases::{collapse_whitespace, normalize_label};
use crate::error::{CoreError, Result};
use crate::model::{
    score_in_range, Annotation, AnnotationSet, ArgumentMapEntry, Domain, RationalityRating,
    Severity, ValidationWarning, WarningKind,
};

/// Payload schema version understood by this validator
pub const SUPPORTED_SCHEMA_VERSION: u64 = 1;

const ARGUMENT_MAP_KEY: &str = "argument_map";
const RATIONALITY_KEY: &str = "rationality";

/// Validate one chunk's raw analyzer payload
pub fn validate_payload(chunk: &TranscriptChunk, raw: &Value) -> Result<AnnotationSet> {
    let idx = chunk.order_index;
    let object = raw.as_object().ok_or_else(|| {
        CoreError::schema_mismatch(idx, format!("expected a JSON object, got {}", kind_of(raw)))
    })?;

    check_schema_version(idx, object)?;

    let mut ctx = Ctx {
        chunk_index: idx,
        warnings: Vec::new(),
    };
    let mut set = AnnotationSet::empty(idx, chunk.char_len());

    for domain in Domain::ALL {
        for (position, entry) in domain_entries(idx, object, domain)?.iter().enumerate() {
            if let Some(annotation) = ctx.annotation(domain, position, entry) {
                set.annotations.push(annotation);
            }
        }
    }

    if let Some(map) = object.get(ARGUMENT_MAP_KEY).filter(|v| !v.is_null()) {
        let entries = map.as_array().ok_or_else(|| {
            CoreError::schema_mismatch(
                idx,
                format!("`{ARGUMENT_MAP_KEY}` must be an array, got {}", kind_of(map)),
            )
        })?;
        for (position, entry) in entries.iter().enumerate() {
            if let Some(claim) = ctx.claim(position, entry) {
                set.argument_map.push(claim);
            }
        }
    }

    set.rating = match object.get(RATIONALITY_KEY) {
        None | Some(Value::Null) => {
            ctx.warn(None, None, WarningKind::MissingRating, "no rationality rating in payload");
            None
        }
        Some(Value::Object(rating)) => ctx.rating(rating)?,
        Some(other) => {
            return Err(CoreError::schema_mismatch(
                idx,
                format!("`{RATIONALITY_KEY}` must be an object, got {}", kind_of(other)),
            ))
        }
    };

    for warning in &ctx.warnings {
        log::debug!("chunk {idx}: {:?}: {}", warning.kind, warning.message);
    }
    if !ctx.warnings.is_empty() {
        log::warn!(
            "chunk {idx}: {} validation warning(s), {} annotation(s) kept",
            ctx.warnings.len(),
            set.annotations.len()
        );
    }

    set.warnings = ctx.warnings;
    Ok(set)
}

fn check_schema_version(idx: usize, object: &Map<String, Value>) -> Result<()> {
    match object.get("schema_version") {
        None | Some(Value::Null) => Ok(()),
        Some(v) if v.as_u64() == Some(SUPPORTED_SCHEMA_VERSION) => Ok(()),
        Some(v) => Err(CoreError::schema_mismatch(
            idx,
            format!("unsupported schema_version {v}; expected {SUPPORTED_SCHEMA_VERSION}"),
        )),
    }
}

/// Entries for a domain, from its payload key and/or short code
fn domain_entries<'a>(
    idx: usize,
    object: &'a Map<String, Value>,
    domain: Domain,
) -> Result<Vec<&'a Value>> {
    let mut out = Vec::new();
    for key in [domain.payload_key(), domain.code()] {
        match object.get(key) {
            None | Some(Value::Null) => {}
            Some(Value::Array(items)) => out.extend(items.iter()),
            Some(other) => {
                return Err(CoreError::schema_mismatch(
                    idx,
                    format!("`{key}` must be an array, got {}", kind_of(other)),
                ))
            }
        }
    }
    Ok(out)
}

struct Ctx {
    chunk_index: usize,
    warnings: Vec<ValidationWarning>,
}

impl Ctx {
    fn warn(
        &mut self,
        domain: Option<Domain>,
        entry_index: Option<usize>,
        kind: WarningKind,
        message: impl Into<String>,
    ) {
        self.warnings.push(ValidationWarning {
            chunk_index: self.chunk_index,
            domain,
            entry_index,
            kind,
            message: message.into(),
        });
    }

    fn annotation(&mut self, domain: Domain, position: usize, entry: &Value) -> Option<Annotation> {
        let Some(fields) = entry.as_object() else {
            self.warn(
                Some(domain),
                Some(position),
                WarningKind::MalformedEntry,
                format!("{} entry is {}, expected an object", domain.code(), kind_of(entry)),
            );
            return None;
        };

        let name = non_blank(fields.get("name"));
        let rationale = non_blank(fields.get("rationale"));
        let (Some(name), Some(rationale)) = (name, rationale) else {
            let missing: Vec<&str> = [("name", name.is_none()), ("rationale", rationale.is_none())]
                .into_iter()
                .filter_map(|(field, absent)| absent.then_some(field))
                .collect();
            self.warn(
                Some(domain),
                Some(position),
                WarningKind::MalformedEntry,
                format!("skipped {} entry missing {}", domain.code(), missing.join(" and ")),
            );
            return None;
        };

        let severity = match fields.get("severity") {
            None | Some(Value::Null) => None,
            Some(Value::String(raw)) if raw.trim().is_empty() => None,
            Some(Value::String(raw)) => Severity::parse(raw).or_else(|| {
                self.warn(
                    Some(domain),
                    Some(position),
                    WarningKind::InvalidSeverity,
                    format!("severity '{raw}' for '{name}' is not Low/Medium/High; set to null"),
                );
                None
            }),
            Some(other) => {
                self.warn(
                    Some(domain),
                    Some(position),
                    WarningKind::InvalidSeverity,
                    format!("severity for '{name}' is {}; set to null", kind_of(other)),
                );
                None
            }
        };

        Some(Annotation {
            domain,
            type_name: name.to_string(),
            rationale: rationale.to_string(),
            severity,
            source_chunk_index: self.chunk_index,
        })
    }

    fn claim(&mut self, position: usize, entry: &Value) -> Option<ArgumentMapEntry> {
        let (claim, is_assumption) = match entry {
            Value::String(text) => (Some(text.trim()).filter(|t| !t.is_empty()), false),
            Value::Object(fields) => (
                non_blank(fields.get("claim")).or_else(|| non_blank(fields.get("claim_text"))),
                fields
                    .get("is_assumption")
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
            ),
            _ => (None, false),
        };

        let Some(claim) = claim else {
            self.warn(
                None,
                Some(position),
                WarningKind::MalformedClaim,
                "skipped argument-map entry without claim text",
            );
            return None;
        };

        Some(ArgumentMapEntry {
            chunk_index: self.chunk_index,
            claim_text: claim.to_string(),
            is_assumption,
        })
    }

    fn rating(&mut self, fields: &Map<String, Value>) -> Result<Option<RationalityRating>> {
        let dimensions = match fields.get("dimensions") {
            None | Some(Value::Null) => None,
            Some(Value::Object(dims)) => Some(dims),
            Some(other) => {
                return Err(CoreError::schema_mismatch(
                    self.chunk_index,
                    format!("`rationality.dimensions` must be an object, got {}", kind_of(other)),
                ))
            }
        };

        let overall = match fields.get("overall_score") {
            None | Some(Value::Null) => {
                self.warn(None, None, WarningKind::MissingRating, "rating has no overall_score");
                return Ok(None);
            }
            Some(v) => v.as_f64(),
        };
        let Some(overall) = overall.filter(|s| score_in_range(*s)) else {
            self.warn(
                None,
                None,
                WarningKind::InvalidRating,
                format!(
                    "overall_score {} is not a number in [1, 5]; rating omitted",
                    fields.get("overall_score").map_or_else(String::new, Value::to_string)
                ),
            );
            return Ok(None);
        };

        let mut per_dimension_scores = BTreeMap::new();
        let mut seen = BTreeSet::new();
        for (name, value) in dimensions.into_iter().flatten() {
            let name = collapse_whitespace(name);
            match value.as_f64().filter(|s| score_in_range(*s)) {
                Some(_) if !name.is_empty() && !seen.insert(normalize_label(&name)) => self.warn(
                    None,
                    None,
                    WarningKind::InvalidDimensionScore,
                    format!("dropped duplicate dimension '{name}'"),
                ),
                Some(score) if !name.is_empty() => {
                    per_dimension_scores.insert(name, score);
                }
                _ => self.warn(
                    None,
                    None,
                    WarningKind::InvalidDimensionScore,
                    format!("dropped dimension '{name}' with score {value}"),
                ),
            }
        }

        Ok(Some(RationalityRating {
            chunk_index: self.chunk_index,
            overall_score: overall,
            per_dimension_scores,
        }))
    }
}

fn non_blank(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn chunk(idx: usize) -> TranscriptChunk {
        TranscriptChunk::new(idx, 0, "They say everyone is doing it.".to_string())
    }

    #[test]
    fn accepts_complete_payload() {
        let raw = json!({
            "schema_version": 1,
            "argument_map": [
                {"claim": "Everyone is switching", "is_assumption": false},
                "Popularity implies correctness"
            ],
            "fallacies": [{"name": "Appeal to Popularity", "rationale": "Cites crowd size", "severity": "medium"}],
            "R": [{"name": "Bandwagon", "rationale": "Urges joining the crowd"}],
            "rationality": {"overall_score": 2, "dimensions": {"Evidence  use": 1, "Fairness": 3}}
        });

        let set = validate_payload(&chunk(3), &raw).expect("valid");
        assert_eq!(set.chunk_index, 3);
        assert_eq!(set.annotations.len(), 2);
        assert_eq!(set.annotations[0].domain, Domain::Fallacy);
        assert_eq!(set.annotations[0].severity, Some(Severity::Medium));
        assert_eq!(set.annotations[1].domain, Domain::RhetoricalTactic);
        assert_eq!(set.annotations[1].severity, None);
        assert_eq!(set.argument_map.len(), 2);
        assert_eq!(set.argument_map[1].claim_text, "Popularity implies correctness");

        let rating = set.rating.expect("rating");
        assert_eq!(rating.overall_score, 2.0);
        assert_eq!(rating.per_dimension_scores.get("Evidence use"), Some(&1.0));
        assert!(set.warnings.is_empty());
    }

    #[test]
    fn entry_without_rationale_is_skipped_not_fatal() {
        let raw = json!({
            "fallacies": [
                {"name": "Straw Man"},
                {"name": "False Dilemma", "rationale": "Only two options offered", "severity": "High"}
            ],
            "rationality": {"overall_score": 3}
        });

        let set = validate_payload(&chunk(0), &raw).expect("valid");
        assert_eq!(set.annotations.len(), 1);
        assert_eq!(set.annotations[0].type_name, "False Dilemma");
        assert!(set.rating.is_some());
        assert_eq!(set.warnings.len(), 1);
        assert_eq!(set.warnings[0].kind, WarningKind::MalformedEntry);
        assert_eq!(set.warnings[0].entry_index, Some(0));
        assert_eq!(set.warnings[0].domain, Some(Domain::Fallacy));
    }

    #[test]
    fn unknown_severity_is_coerced_to_null() {
        let raw = json!({
            "biases": [{"name": "Anchoring", "rationale": "First number sticks", "severity": "extreme"}],
            "rationality": {"overall_score": 4}
        });
        let set = validate_payload(&chunk(1), &raw).expect("valid");
        assert_eq!(set.annotations[0].severity, None);
        assert_eq!(set.warnings[0].kind, WarningKind::InvalidSeverity);
    }

    #[test]
    fn missing_rating_is_absent_not_zero() {
        let raw = json!({"fallacies": []});
        let set = validate_payload(&chunk(0), &raw).expect("valid");
        assert_eq!(set.rating, None);
        assert_eq!(set.warnings[0].kind, WarningKind::MissingRating);
    }

    #[test]
    fn out_of_range_rating_is_dropped() {
        let raw = json!({"rationality": {"overall_score": 7, "dimensions": {"Evidence use": 2}}});
        let set = validate_payload(&chunk(0), &raw).expect("valid");
        assert_eq!(set.rating, None);
        assert_eq!(set.warnings[0].kind, WarningKind::InvalidRating);
    }

    #[test]
    fn bad_dimension_dropped_individually() {
        let raw = json!({"rationality": {"overall_score": 4.5, "dimensions": {"A": 0, "B": "high", "C": 5}}});
        let set = validate_payload(&chunk(0), &raw).expect("valid");
        let rating = set.rating.expect("rating");
        assert_eq!(rating.per_dimension_scores.len(), 1);
        assert_eq!(set.warnings.len(), 2);
        assert!(set
            .warnings
            .iter()
            .all(|w| w.kind == WarningKind::InvalidDimensionScore));
    }

    #[test]
    fn non_object_entry_is_malformed() {
        let raw = json!({"manipulation_patterns": ["Gaslighting"], "rationality": {"overall_score": 1}});
        let set = validate_payload(&chunk(0), &raw).expect("valid");
        assert!(set.annotations.is_empty());
        assert_eq!(set.warnings[0].kind, WarningKind::MalformedEntry);
    }

    #[test]
    fn structural_mismatches_are_fatal() {
        let cases = [
            json!([1, 2, 3]),
            json!({"schema_version": 2}),
            json!({"fallacies": {"name": "Straw Man"}}),
            json!({"argument_map": "claims"}),
            json!({"rationality": 4}),
            json!({"rationality": {"overall_score": 4, "dimensions": [1, 2]}}),
        ];
        for raw in cases {
            let err = validate_payload(&chunk(5), &raw).expect_err("mismatch");
            match err {
                CoreError::SchemaVersionMismatch { chunk_index, .. } => assert_eq!(chunk_index, 5),
                other => panic!("unexpected error: {other}"),
            }
        }
    }

    #[test]
    fn validation_is_pure() {
        let raw = json!({
            "fallacies": [{"name": "Ad Hominem"}, {"name": "Slippery Slope", "rationale": "Chain of doom", "severity": "?"}],
        });
        let a = validate_payload(&chunk(2), &raw).expect("valid");
        let b = validate_payload(&chunk(2), &raw).expect("valid");
        assert_eq!(a, b);
    }

    #[test]
    fn case_variant_dimensions_keep_first_spelling() {
        let raw = json!({
            "rationality": {"overall_score": 2, "dimensions": {"Evidence use": 1, "evidence  use": 4}}
        });
        let set = validate_payload(&chunk(0), &raw).expect("valid");
        let rating = set.rating.expect("rating");
        assert_eq!(rating.per_dimension_scores.len(), 1);
        assert_eq!(rating.per_dimension_scores.get("Evidence use"), Some(&1.0));
        assert_eq!(set.warnings.len(), 1);
        assert_eq!(set.warnings[0].kind, WarningKind::InvalidDimensionScore);
    }
}
