//! Taxonomy Aggregator: merges validated annotation sets across chunks into
//! one row per `(domain, canonical type)`.
//!
//! Counting rules:
//! - `chunk_count` counts distinct chunks, not mentions
//! - each (type, chunk) pair contributes one severity observation, the highest
//!   severity reported for that type in that chunk
//! - excerpts are the first rationale per chunk, earliest `excerpt_cap` chunks
//!
//! The accumulator folds chunks in any order, one at a time, touching only the
//! rows the new annotations belong to.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::aliases::AliasTable;
use crate::error::{CoreError, Result};
use crate::model::{AnnotationSet, Domain, Severity};

/// Configuration for taxonomy aggregation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaxonomyConfig {
    /// Domain-scoped synonym table
    pub aliases: AliasTable,

    /// Representative excerpts kept per canonical type
    pub excerpt_cap: usize,

    /// Occurrence-rate bucketing
    pub frequency: FrequencyThresholds,
}

impl Default for TaxonomyConfig {
    fn default() -> Self {
        Self {
            aliases: AliasTable::default(),
            excerpt_cap: 3,
            frequency: FrequencyThresholds::default(),
        }
    }
}

impl TaxonomyConfig {
    pub fn validate(&self) -> Result<()> {
        self.frequency.validate()
    }
}

/// Occurrence-rate thresholds, as fractions of analyzed chunks.
///
/// - Low: reported by a single chunk, or `ratio < low_below`
/// - High: `ratio > high_above`
/// - Medium: everything in between (`low_below <= ratio <= high_above`)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrequencyThresholds {
    pub low_below: f64,
    pub high_above: f64,
}

impl Default for FrequencyThresholds {
    fn default() -> Self {
        Self {
            low_below: 0.20,
            high_above: 0.50,
        }
    }
}

impl FrequencyThresholds {
    pub fn validate(&self) -> Result<()> {
        let in_unit = |v: f64| (0.0..=1.0).contains(&v);
        if !in_unit(self.low_below) || !in_unit(self.high_above) {
            return Err(CoreError::invalid_config(format!(
                "frequency thresholds must lie in [0, 1] (low_below={}, high_above={})",
                self.low_below, self.high_above
            )));
        }
        if self.low_below > self.high_above {
            return Err(CoreError::invalid_config(format!(
                "low_below ({}) cannot exceed high_above ({})",
                self.low_below, self.high_above
            )));
        }
        Ok(())
    }

    /// Bucket `chunk_count` relative to the number of analyzed chunks
    #[must_use]
    pub fn label(&self, chunk_count: usize, analyzed_chunks: usize) -> FrequencyLabel {
        if chunk_count <= 1 || analyzed_chunks == 0 {
            return FrequencyLabel::Low;
        }
        #[allow(clippy::cast_precision_loss)]
        let ratio = chunk_count as f64 / analyzed_chunks as f64;
        if ratio < self.low_below {
            FrequencyLabel::Low
        } else if ratio > self.high_above {
            FrequencyLabel::High
        } else {
            FrequencyLabel::Medium
        }
    }
}

/// User-facing occurrence rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FrequencyLabel {
    Low,
    Medium,
    High,
}

impl FrequencyLabel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }
}

/// Rationale text traced back to its chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Excerpt {
    pub chunk_index: usize,
    pub rationale: String,
}

/// One row of the master taxonomy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterTaxonomyEntry {
    pub domain: Domain,
    pub canonical_type_name: String,

    /// Distinct chunks reporting this type at least once
    pub chunk_count: usize,

    /// One observation per chunk: the highest severity in that chunk
    pub severity_distribution: BTreeMap<Severity, usize>,

    /// Chunks where every mention of this type lacked a severity
    pub unrated_chunks: usize,

    /// Earliest-first, at most `excerpt_cap`
    pub representative_excerpts: Vec<Excerpt>,

    /// Every chunk reporting this type, ascending
    pub chunk_indices: Vec<usize>,
}

/// Point-in-time view of an accumulator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxonomySnapshot {
    /// Chunks folded so far
    pub analyzed_chunks: usize,

    /// Rows ordered by domain, then by normalized canonical name
    pub entries: Vec<MasterTaxonomyEntry>,
}

impl TaxonomySnapshot {
    pub fn entries_in(&self, domain: Domain) -> impl Iterator<Item = &MasterTaxonomyEntry> {
        self.entries.iter().filter(move |e| e.domain == domain)
    }
}

#[derive(Debug, Clone)]
struct EntryState {
    /// Canonical spelling from the alias table, if any mention was aliased
    canonical: Option<String>,

    /// Earliest raw spelling, ranked by (chunk, position)
    earliest: (usize, usize, String),

    /// chunk index → highest severity seen in that chunk
    chunks: BTreeMap<usize, Option<Severity>>,

    /// Bounded to the earliest `excerpt_cap` chunks
    excerpts: BTreeMap<usize, String>,
}

/// Incremental, single-writer taxonomy state for one run
#[derive(Debug, Clone)]
pub struct TaxonomyAccumulator {
    aliases: AliasTable,
    excerpt_cap: usize,
    entries: BTreeMap<(Domain, String), EntryState>,
    folded_chunks: BTreeSet<usize>,
}

impl TaxonomyAccumulator {
    #[must_use]
    pub fn new(config: &TaxonomyConfig) -> Self {
        Self {
            aliases: config.aliases.clone(),
            excerpt_cap: config.excerpt_cap,
            entries: BTreeMap::new(),
            folded_chunks: BTreeSet::new(),
        }
    }

    /// Fold one chunk's validated set. Returns `false` (and changes nothing)
    /// if this chunk index was already folded.
    pub fn fold(&mut self, set: &AnnotationSet) -> bool {
        let chunk = set.chunk_index;
        if !self.folded_chunks.insert(chunk) {
            log::warn!("chunk {chunk} already folded into taxonomy; ignoring duplicate");
            return false;
        }

        for (position, annotation) in set.annotations.iter().enumerate() {
            let resolved = self.aliases.resolve(annotation.domain, &annotation.type_name);
            let state = self
                .entries
                .entry((annotation.domain, resolved.key))
                .or_insert_with(|| EntryState {
                    canonical: None,
                    earliest: (chunk, position, resolved.display.clone()),
                    chunks: BTreeMap::new(),
                    excerpts: BTreeMap::new(),
                });

            if resolved.aliased {
                state.canonical = Some(resolved.display.clone());
            }
            if (chunk, position) < (state.earliest.0, state.earliest.1) {
                state.earliest = (chunk, position, resolved.display);
            }

            let slot = state.chunks.entry(chunk).or_insert(None);
            *slot = (*slot).max(annotation.severity);

            if self.excerpt_cap > 0 {
                state
                    .excerpts
                    .entry(chunk)
                    .or_insert_with(|| annotation.rationale.clone());
                while state.excerpts.len() > self.excerpt_cap {
                    state.excerpts.pop_last();
                }
            }
        }

        log::debug!(
            "folded chunk {chunk}: {} annotation(s), {} taxonomy row(s) total",
            set.annotations.len(),
            self.entries.len()
        );
        true
    }

    #[must_use]
    pub fn analyzed_chunks(&self) -> usize {
        self.folded_chunks.len()
    }

    /// Materialize the current taxonomy rows
    #[must_use]
    pub fn snapshot(&self) -> TaxonomySnapshot {
        let entries = self
            .entries
            .iter()
            .map(|((domain, _), state)| {
                let mut severity_distribution = BTreeMap::new();
                let mut unrated_chunks = 0;
                for severity in state.chunks.values() {
                    match severity {
                        Some(s) => *severity_distribution.entry(*s).or_insert(0) += 1,
                        None => unrated_chunks += 1,
                    }
                }

                MasterTaxonomyEntry {
                    domain: *domain,
                    canonical_type_name: state
                        .canonical
                        .clone()
                        .unwrap_or_else(|| state.earliest.2.clone()),
                    chunk_count: state.chunks.len(),
                    severity_distribution,
                    unrated_chunks,
                    representative_excerpts: state
                        .excerpts
                        .iter()
                        .map(|(chunk_index, rationale)| Excerpt {
                            chunk_index: *chunk_index,
                            rationale: rationale.clone(),
                        })
                        .collect(),
                    chunk_indices: state.chunks.keys().copied().collect(),
                }
            })
            .collect();

        TaxonomySnapshot {
            analyzed_chunks: self.folded_chunks.len(),
            entries,
        }
    }
}

/// Batch convenience: fold every set and snapshot
#[must_use]
pub fn aggregate<'a>(
    config: &TaxonomyConfig,
    sets: impl IntoIterator<Item = &'a AnnotationSet>,
) -> TaxonomySnapshot {
    let mut acc = TaxonomyAccumulator::new(config);
    for set in sets {
        acc.fold(set);
    }
    acc.snapshot()
}
