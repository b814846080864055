//! Templated narrative summary.
//!
//! Every sentence is a fixed template filled with aggregated values; nothing
//! here invents content beyond the counts, names and excerpts it is given.

use serde::{Deserialize, Serialize};

use crate::model::Domain;
use crate::rating::{FusionMethod, ProfileStatus, RationalityProfile};
use crate::report::{CoverageSummary, DetectedRow, SourceInfo, TaxonomyRow};

/// Excerpts quoted in the narrative
pub const NARRATIVE_EXCERPTS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarrativeSummary {
    pub overview: String,
    /// Present only when some chunks are missing from the counts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coverage_note: Option<String>,
    /// One sentence per domain, F, B, R, M order
    pub domain_findings: Vec<String>,
    pub rationality: String,
    pub excerpts: Vec<String>,
}

impl NarrativeSummary {
    /// All paragraphs in reading order
    pub fn paragraphs(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.overview.as_str())
            .chain(self.coverage_note.as_deref())
            .chain(self.domain_findings.iter().map(String::as_str))
            .chain(std::iter::once(self.rationality.as_str()))
    }
}

#[must_use]
pub fn narrate(
    source: &SourceInfo,
    coverage: &CoverageSummary,
    taxonomy: &[TaxonomyRow],
    profile: &RationalityProfile,
) -> NarrativeSummary {
    let detected: Vec<&DetectedRow> = taxonomy.iter().filter_map(TaxonomyRow::detected).collect();
    let domains_with_findings = Domain::ALL
        .iter()
        .filter(|d| detected.iter().any(|row| row.domain == **d))
        .count();

    let overview = format!(
        "\"{}\" ({}) was split into {} chunk(s), {} of which were analyzed. \
         {} distinct pattern type(s) were detected across {} of {} domains.",
        source.title,
        source.label,
        coverage.total_chunks,
        coverage.analyzed_chunks,
        detected.len(),
        domains_with_findings,
        Domain::ALL.len()
    );

    let coverage_note = coverage.incomplete_coverage.then(|| {
        format!(
            "Coverage is incomplete: {} of {} chunk(s) could not be analyzed (chunks {}). \
             Counts and scores below describe the analyzed chunks only.",
            coverage.degraded_chunks,
            coverage.total_chunks,
            join_indices(&coverage.degraded_indices)
        )
    });

    let domain_findings = Domain::ALL
        .iter()
        .map(|domain| domain_sentence(*domain, &detected, coverage.analyzed_chunks))
        .collect();

    NarrativeSummary {
        overview,
        coverage_note,
        domain_findings,
        rationality: rationality_sentence(profile),
        excerpts: excerpt_lines(&detected),
    }
}

fn domain_sentence(domain: Domain, detected: &[&DetectedRow], analyzed: usize) -> String {
    // Rows arrive sorted by chunk count, so the first row is the most frequent
    let rows: Vec<&&DetectedRow> = detected.iter().filter(|r| r.domain == domain).collect();
    match rows.first() {
        None => format!("{}: none detected.", domain.label()),
        Some(top) => format!(
            "{}: {} type(s) detected; most frequent is {} in {} of {} analyzed chunk(s) ({} frequency).",
            domain.label(),
            rows.len(),
            top.canonical_type_name,
            top.chunk_count,
            analyzed,
            top.frequency.as_str()
        ),
    }
}

fn rationality_sentence(profile: &RationalityProfile) -> String {
    let (Some(score), Some(mean)) = (profile.overall_score, profile.overall_mean) else {
        return "Rationality: insufficient data; no chunk returned a usable rating.".to_string();
    };

    let mut sentence = format!(
        "Rationality: {score}/5 overall ({} of {} rated chunk(s), unrounded {mean:.2}, coverage {:.0}%).",
        method_label(profile.method),
        profile.rated_chunks,
        profile.chunk_coverage * 100.0
    );
    if profile.status == ProfileStatus::Partial {
        sentence.push_str(" Some chunks carried no rating.");
    }
    if !profile.strengths.is_empty() {
        sentence.push_str(&format!(" Stronger dimensions: {}.", profile.strengths.join(", ")));
    }
    if !profile.weaknesses.is_empty() {
        sentence.push_str(&format!(" Weaker dimensions: {}.", profile.weaknesses.join(", ")));
    }
    if let (Some(low), Some(high)) = (profile.lowest_chunk, profile.highest_chunk) {
        if low.chunk_index != high.chunk_index {
            sentence.push_str(&format!(
                " Lowest-rated chunk: {} ({}); highest-rated chunk: {} ({}).",
                low.chunk_index, low.overall_score, high.chunk_index, high.overall_score
            ));
        }
    }
    sentence
}

const fn method_label(method: FusionMethod) -> &'static str {
    match method {
        FusionMethod::Mean => "mean",
        FusionMethod::TrimmedMean { .. } => "trimmed mean",
        FusionMethod::LengthWeighted => "length-weighted mean",
    }
}

/// First excerpt of the most widespread types, across all domains
fn excerpt_lines(detected: &[&DetectedRow]) -> Vec<String> {
    let mut ranked: Vec<&&DetectedRow> = detected.iter().collect();
    ranked.sort_by(|a, b| {
        b.chunk_count
            .cmp(&a.chunk_count)
            .then_with(|| a.domain.cmp(&b.domain))
            .then_with(|| a.canonical_type_name.cmp(&b.canonical_type_name))
    });
    ranked
        .into_iter()
        .filter_map(|row| {
            row.representative_excerpts.first().map(|excerpt| {
                format!(
                    "{} ({}, chunk {}): \"{}\"",
                    row.canonical_type_name,
                    row.domain.label(),
                    excerpt.chunk_index,
                    excerpt.rationale
                )
            })
        })
        .take(NARRATIVE_EXCERPTS)
        .collect()
}

fn join_indices(indices: &[usize]) -> String {
    indices
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
