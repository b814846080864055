//! Report Composer: assembles the lesson-level artifacts.
//!
//! The composer only rearranges what the aggregator, the rating fusion and
//! the validated chunk outcomes already contain. Rendering to text is left to
//! a [`ReportFormatter`].

use reasonscan_chunker::{Transcript, TranscriptChunk};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::error::Result;
use crate::model::{
    Annotation, ArgumentMapEntry, ChunkOutcome, Domain, RationalityRating, Severity,
    ValidationWarning,
};
use crate::narrative::{narrate, NarrativeSummary};
use crate::rating::RationalityProfile;
use crate::taxonomy::{Excerpt, FrequencyLabel, FrequencyThresholds, TaxonomySnapshot};

/// Version of the [`LessonReport`] layout
pub const REPORT_SCHEMA_VERSION: u32 = 1;

/// Reason recorded for a chunk with no outcome at composition time
pub const MISSING_OUTCOME_REASON: &str = "no analysis result recorded";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInfo {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Best human-readable label: source, else title, else id
    pub label: String,
}

impl From<&Transcript> for SourceInfo {
    fn from(transcript: &Transcript) -> Self {
        Self {
            id: transcript.id.clone(),
            title: transcript.title.clone(),
            source: transcript.source.clone(),
            label: transcript.label().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageSummary {
    pub total_chunks: usize,
    pub analyzed_chunks: usize,
    pub degraded_chunks: usize,
    /// Indices of degraded chunks, ascending
    pub degraded_indices: Vec<usize>,
    /// Set whenever any chunk is missing from the counts
    pub incomplete_coverage: bool,
    pub validation_warnings: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkStatus {
    Analyzed,
    Degraded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Degradation {
    pub attempts: u32,
    pub reason: String,
}

/// Per-chunk echo of validated output, for traceability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkReport {
    pub chunk_index: usize,
    pub start_offset: usize,
    pub end_offset: usize,
    pub char_len: usize,
    pub status: ChunkStatus,
    pub annotations: Vec<Annotation>,
    pub argument_map: Vec<ArgumentMapEntry>,
    pub rating: Option<RationalityRating>,
    pub warnings: Vec<ValidationWarning>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degradation: Option<Degradation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedRow {
    pub domain: Domain,
    pub canonical_type_name: String,
    pub chunk_count: usize,
    pub frequency: FrequencyLabel,
    pub severity_distribution: BTreeMap<Severity, usize>,
    pub unrated_chunks: usize,
    pub chunk_indices: Vec<usize>,
    pub representative_excerpts: Vec<Excerpt>,
}

/// One row of the master taxonomy table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaxonomyRow {
    Detected(DetectedRow),
    /// Explicit placeholder for a domain with no findings
    NoneDetected { domain: Domain },
}

impl TaxonomyRow {
    #[must_use]
    pub const fn domain(&self) -> Domain {
        match self {
            Self::Detected(row) => row.domain,
            Self::NoneDetected { domain } => *domain,
        }
    }

    #[must_use]
    pub const fn detected(&self) -> Option<&DetectedRow> {
        match self {
            Self::Detected(row) => Some(row),
            Self::NoneDetected { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonReport {
    pub schema_version: u32,
    pub source: SourceInfo,
    pub coverage: CoverageSummary,
    pub frequency_thresholds: FrequencyThresholds,
    pub chunks: Vec<ChunkReport>,
    pub taxonomy: Vec<TaxonomyRow>,
    pub rationality: RationalityProfile,
    pub narrative: NarrativeSummary,
}

impl LessonReport {
    pub fn taxonomy_in(&self, domain: Domain) -> impl Iterator<Item = &TaxonomyRow> {
        self.taxonomy.iter().filter(move |row| row.domain() == domain)
    }
}

/// Everything the composer reads
#[derive(Debug, Clone, Copy)]
pub struct ReportInputs<'a> {
    pub transcript: &'a Transcript,
    pub chunks: &'a [TranscriptChunk],
    pub outcomes: &'a [ChunkOutcome],
    pub taxonomy: &'a TaxonomySnapshot,
    pub profile: &'a RationalityProfile,
    pub frequency: FrequencyThresholds,
}

#[must_use]
pub fn compose_report(inputs: &ReportInputs<'_>) -> LessonReport {
    let by_index: HashMap<usize, &ChunkOutcome> = inputs
        .outcomes
        .iter()
        .map(|outcome| (outcome.chunk_index(), outcome))
        .collect();

    let chunks: Vec<ChunkReport> = inputs
        .chunks
        .iter()
        .map(|chunk| chunk_report(chunk, by_index.get(&chunk.order_index).copied()))
        .collect();

    let degraded_indices: Vec<usize> = chunks
        .iter()
        .filter(|c| c.status == ChunkStatus::Degraded)
        .map(|c| c.chunk_index)
        .collect();
    let coverage = CoverageSummary {
        total_chunks: chunks.len(),
        analyzed_chunks: chunks.len() - degraded_indices.len(),
        degraded_chunks: degraded_indices.len(),
        incomplete_coverage: !degraded_indices.is_empty(),
        degraded_indices,
        validation_warnings: chunks.iter().map(|c| c.warnings.len()).sum(),
    };

    let taxonomy = taxonomy_table(inputs.taxonomy, inputs.frequency);
    let source = SourceInfo::from(inputs.transcript);
    let narrative = narrate(&source, &coverage, &taxonomy, inputs.profile);

    log::debug!(
        "composed report for '{}': {} chunk(s), {} taxonomy row(s)",
        source.label,
        coverage.total_chunks,
        taxonomy.len()
    );

    LessonReport {
        schema_version: REPORT_SCHEMA_VERSION,
        source,
        coverage,
        frequency_thresholds: inputs.frequency,
        chunks,
        taxonomy,
        rationality: inputs.profile.clone(),
        narrative,
    }
}

fn chunk_report(chunk: &TranscriptChunk, outcome: Option<&ChunkOutcome>) -> ChunkReport {
    let mut report = ChunkReport {
        chunk_index: chunk.order_index,
        start_offset: chunk.start_offset,
        end_offset: chunk.end_offset,
        char_len: chunk.char_len(),
        status: ChunkStatus::Degraded,
        annotations: Vec::new(),
        argument_map: Vec::new(),
        rating: None,
        warnings: Vec::new(),
        degradation: None,
    };
    match outcome {
        Some(ChunkOutcome::Analyzed(set)) => {
            report.status = ChunkStatus::Analyzed;
            report.annotations.clone_from(&set.annotations);
            report.argument_map.clone_from(&set.argument_map);
            report.rating.clone_from(&set.rating);
            report.warnings.clone_from(&set.warnings);
        }
        Some(ChunkOutcome::Degraded(d)) => {
            report.degradation = Some(Degradation {
                attempts: d.attempts,
                reason: d.reason.clone(),
            });
        }
        None => {
            report.degradation = Some(Degradation {
                attempts: 0,
                reason: MISSING_OUTCOME_REASON.to_string(),
            });
        }
    }
    report
}

/// Rows in F, B, R, M order; within a domain by chunk count (desc), then name
fn taxonomy_table(snapshot: &TaxonomySnapshot, frequency: FrequencyThresholds) -> Vec<TaxonomyRow> {
    let mut table = Vec::new();
    for domain in Domain::ALL {
        let mut rows: Vec<DetectedRow> = snapshot
            .entries_in(domain)
            .map(|entry| DetectedRow {
                domain,
                canonical_type_name: entry.canonical_type_name.clone(),
                chunk_count: entry.chunk_count,
                frequency: frequency.label(entry.chunk_count, snapshot.analyzed_chunks),
                severity_distribution: entry.severity_distribution.clone(),
                unrated_chunks: entry.unrated_chunks,
                chunk_indices: entry.chunk_indices.clone(),
                representative_excerpts: entry.representative_excerpts.clone(),
            })
            .collect();

        if rows.is_empty() {
            table.push(TaxonomyRow::NoneDetected { domain });
            continue;
        }
        rows.sort_by(|a, b| {
            b.chunk_count
                .cmp(&a.chunk_count)
                .then_with(|| a.canonical_type_name.to_lowercase().cmp(&b.canonical_type_name.to_lowercase()))
        });
        table.extend(rows.into_iter().map(TaxonomyRow::Detected));
    }
    table
}

/// Caller-supplied rendering of a [`LessonReport`]
pub trait ReportFormatter {
    /// Short identifier, e.g. `"json"`
    fn name(&self) -> &'static str;

    fn render(&self, report: &LessonReport) -> Result<String>;
}

/// Stable machine-readable rendering
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFormatter {
    pub pretty: bool,
}

impl ReportFormatter for JsonFormatter {
    fn name(&self) -> &'static str {
        "json"
    }

    fn render(&self, report: &LessonReport) -> Result<String> {
        let rendered = if self.pretty {
            serde_json::to_string_pretty(report)?
        } else {
            serde_json::to_string(report)?
        };
        Ok(rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AnnotationSet, DegradedChunk};
    use crate::rating::{fuse, RatingConfig};
    use crate::taxonomy::{aggregate, TaxonomyConfig};
    use pretty_assertions::assert_eq;

    fn fixture() -> (Transcript, Vec<TranscriptChunk>) {
        let transcript = Transcript::new("t-1", "Debate night", "One. Two. Three.");
        let chunks = vec![
            TranscriptChunk::new(0, 0, "One. ".to_string()),
            TranscriptChunk::new(1, 5, "Two. ".to_string()),
            TranscriptChunk::new(2, 10, "Three.".to_string()),
        ];
        (transcript, chunks)
    }

    fn annotation(domain: Domain, name: &str, chunk: usize) -> Annotation {
        Annotation {
            domain,
            type_name: name.to_string(),
            rationale: format!("{name} in {chunk}"),
            severity: Some(Severity::Medium),
            source_chunk_index: chunk,
        }
    }

    fn outcomes() -> Vec<ChunkOutcome> {
        vec![
            ChunkOutcome::Analyzed(AnnotationSet {
                annotations: vec![
                    annotation(Domain::Fallacy, "Straw Man", 0),
                    annotation(Domain::Fallacy, "Ad Hominem", 0),
                ],
                ..AnnotationSet::empty(0, 5)
            }),
            ChunkOutcome::Analyzed(AnnotationSet {
                annotations: vec![annotation(Domain::Fallacy, "Straw Man", 1)],
                ..AnnotationSet::empty(1, 5)
            }),
            ChunkOutcome::Degraded(DegradedChunk {
                chunk_index: 2,
                attempts: 3,
                reason: "analyzer timed out".to_string(),
            }),
        ]
    }

    fn compose(outcomes: &[ChunkOutcome]) -> LessonReport {
        let (transcript, chunks) = fixture();
        let sets: Vec<&AnnotationSet> = outcomes
            .iter()
            .filter_map(|o| match o {
                ChunkOutcome::Analyzed(set) => Some(set),
                ChunkOutcome::Degraded(_) => None,
            })
            .collect();
        let snapshot = aggregate(&TaxonomyConfig::default(), sets.iter().copied());
        let profile = fuse(&RatingConfig::default(), chunks.len(), sets.iter().copied());
        compose_report(&ReportInputs {
            transcript: &transcript,
            chunks: &chunks,
            outcomes,
            taxonomy: &snapshot,
            profile: &profile,
            frequency: FrequencyThresholds::default(),
        })
    }

    #[test]
    fn every_domain_has_a_row() {
        let report = compose(&outcomes());
        for domain in Domain::ALL {
            assert!(report.taxonomy_in(domain).count() >= 1, "{domain} missing");
        }
        assert_eq!(
            report.taxonomy_in(Domain::Bias).collect::<Vec<_>>(),
            vec![&TaxonomyRow::NoneDetected { domain: Domain::Bias }]
        );
    }

    #[test]
    fn rows_sorted_by_chunk_count_then_name() {
        let report = compose(&outcomes());
        let names: Vec<&str> = report
            .taxonomy_in(Domain::Fallacy)
            .filter_map(TaxonomyRow::detected)
            .map(|r| r.canonical_type_name.as_str())
            .collect();
        assert_eq!(names, vec!["Straw Man", "Ad Hominem"]);
        let straw = report.taxonomy[0].detected().expect("detected");
        assert_eq!(straw.frequency, FrequencyLabel::High);
    }

    #[test]
    fn degraded_chunks_flag_incomplete_coverage() {
        let report = compose(&outcomes());
        assert_eq!(report.coverage.analyzed_chunks, 2);
        assert_eq!(report.coverage.degraded_indices, vec![2]);
        assert!(report.coverage.incomplete_coverage);
        assert_eq!(report.chunks[2].status, ChunkStatus::Degraded);
        assert_eq!(
            report.chunks[2].degradation.as_ref().map(|d| d.reason.as_str()),
            Some("analyzer timed out")
        );
    }

    #[test]
    fn missing_outcome_is_reported_degraded() {
        let mut partial = outcomes();
        partial.truncate(2);
        let report = compose(&partial);
        assert_eq!(
            report.chunks[2].degradation.as_ref().map(|d| d.reason.as_str()),
            Some(MISSING_OUTCOME_REASON)
        );
    }

    #[test]
    fn json_rows_are_tagged() {
        let report = compose(&outcomes());
        let json = JsonFormatter::default().render(&report).expect("render");
        let value: serde_json::Value = serde_json::from_str(&json).expect("json");
        assert_eq!(value["schema_version"], 1);
        assert_eq!(value["taxonomy"][0]["status"], "detected");
        let statuses: Vec<&str> = value["taxonomy"]
            .as_array()
            .expect("rows")
            .iter()
            .filter_map(|row| row["status"].as_str())
            .collect();
        assert!(statuses.contains(&"none_detected"));
    }
}
