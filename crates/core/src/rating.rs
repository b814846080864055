//! Rating Fusion: combines per-chunk rationality ratings into a lesson profile.
//!
//! Ratings are stored by chunk index as they arrive and fused only when the
//! profile is requested, always in chunk-index order. The result therefore
//! does not depend on the order chunks finished in.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::aliases::normalize_label;
use crate::error::{CoreError, Result};
use crate::model::{AnnotationSet, RationalityRating, SCORE_RANGE};

/// Dimensions the analyzer is asked to rate
pub const DEFAULT_DIMENSIONS: [&str; 5] = [
    "Evidence use",
    "Causal reasoning",
    "Emotional framing",
    "Fairness/balance",
    "Motive attribution",
];

/// Dimension mean at or above which a dimension is reported as a strength
pub const STRENGTH_THRESHOLD: f64 = 4.0;

/// Dimension mean at or below which a dimension is reported as a weakness
pub const WEAKNESS_THRESHOLD: f64 = 2.0;

/// How chunk overall scores are combined
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FusionMethod {
    /// Unweighted arithmetic mean
    #[default]
    Mean,
    /// Drop `floor(n * trim_fraction)` scores from each end, then average
    TrimmedMean { trim_fraction: f64 },
    /// Mean weighted by chunk length in characters
    LengthWeighted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RatingConfig {
    pub method: FusionMethod,

    /// Always reported, as `null` when no chunk rated them
    pub expected_dimensions: Vec<String>,
}

impl Default for RatingConfig {
    fn default() -> Self {
        Self {
            method: FusionMethod::Mean,
            expected_dimensions: DEFAULT_DIMENSIONS.iter().map(|d| (*d).to_string()).collect(),
        }
    }
}

impl RatingConfig {
    pub fn validate(&self) -> Result<()> {
        if let FusionMethod::TrimmedMean { trim_fraction } = self.method {
            if !(0.0..0.5).contains(&trim_fraction) {
                return Err(CoreError::invalid_config(format!(
                    "trim_fraction must be in [0, 0.5), got {trim_fraction}"
                )));
            }
        }
        Ok(())
    }
}

/// Completeness of a profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileStatus {
    /// Every chunk contributed a rating
    Complete,
    /// Some chunks are missing a rating
    Partial,
    /// No chunk was rated; no score is reported
    InsufficientData,
}

impl ProfileStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Complete => "complete",
            Self::Partial => "partial",
            Self::InsufficientData => "insufficient data",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChunkScore {
    pub chunk_index: usize,
    pub overall_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RationalityProfile {
    /// Rounded fused score, `None` when no chunk was rated
    pub overall_score: Option<u8>,

    /// Unrounded fused score
    pub overall_mean: Option<f64>,

    pub method: FusionMethod,

    /// Mean per dimension; `None` for a dimension no chunk rated
    pub dimension_scores: BTreeMap<String, Option<f64>>,

    pub rated_chunks: usize,
    pub total_chunks: usize,

    /// `rated_chunks / total_chunks`
    pub chunk_coverage: f64,

    pub status: ProfileStatus,

    /// Per-chunk overall scores in chunk order
    pub chunk_scores: Vec<ChunkScore>,

    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub lowest_chunk: Option<ChunkScore>,
    pub highest_chunk: Option<ChunkScore>,
}

#[derive(Debug, Clone)]
struct StoredRating {
    rating: RationalityRating,
    chunk_chars: usize,
}

/// Single-writer rating state for one run
#[derive(Debug, Clone)]
pub struct RatingAccumulator {
    config: RatingConfig,
    total_chunks: usize,
    folded: BTreeSet<usize>,
    ratings: BTreeMap<usize, StoredRating>,
}

impl RatingAccumulator {
    #[must_use]
    pub fn new(config: &RatingConfig, total_chunks: usize) -> Self {
        Self {
            config: config.clone(),
            total_chunks,
            folded: BTreeSet::new(),
            ratings: BTreeMap::new(),
        }
    }

    /// Record one chunk's rating, if it has one. Returns `false` for a chunk
    /// index that was already folded.
    pub fn fold(&mut self, set: &AnnotationSet) -> bool {
        if !self.folded.insert(set.chunk_index) {
            log::warn!(
                "chunk {} already folded into rating fusion; ignoring duplicate",
                set.chunk_index
            );
            return false;
        }
        if let Some(rating) = &set.rating {
            self.ratings.insert(
                set.chunk_index,
                StoredRating {
                    rating: rating.clone(),
                    chunk_chars: set.chunk_chars,
                },
            );
        }
        true
    }

    /// Fuse everything folded so far
    #[must_use]
    pub fn finalize(&self) -> RationalityProfile {
        let stored: Vec<&StoredRating> = self.ratings.values().collect();
        let rated_chunks = stored.len();

        let overall_mean = fuse_overall(self.config.method, &stored);
        let overall_score = overall_mean.map(round_score);

        let dimension_scores = self.fuse_dimensions(&stored);
        let strengths = dimension_scores
            .iter()
            .filter(|(_, v)| v.is_some_and(|s| s >= STRENGTH_THRESHOLD))
            .map(|(k, _)| k.clone())
            .collect();
        let weaknesses = dimension_scores
            .iter()
            .filter(|(_, v)| v.is_some_and(|s| s <= WEAKNESS_THRESHOLD))
            .map(|(k, _)| k.clone())
            .collect();

        let chunk_scores: Vec<ChunkScore> = stored
            .iter()
            .map(|s| ChunkScore {
                chunk_index: s.rating.chunk_index,
                overall_score: s.rating.overall_score,
            })
            .collect();
        // Ties resolve to the earliest chunk
        let lowest_chunk = chunk_scores
            .iter()
            .copied()
            .reduce(|a, b| if b.overall_score < a.overall_score { b } else { a });
        let highest_chunk = chunk_scores
            .iter()
            .copied()
            .reduce(|a, b| if b.overall_score > a.overall_score { b } else { a });

        let status = if rated_chunks == 0 {
            ProfileStatus::InsufficientData
        } else if rated_chunks >= self.total_chunks {
            ProfileStatus::Complete
        } else {
            ProfileStatus::Partial
        };

        #[allow(clippy::cast_precision_loss)]
        let chunk_coverage = if self.total_chunks == 0 {
            0.0
        } else {
            rated_chunks as f64 / self.total_chunks as f64
        };

        RationalityProfile {
            overall_score,
            overall_mean,
            method: self.config.method,
            dimension_scores,
            rated_chunks,
            total_chunks: self.total_chunks,
            chunk_coverage,
            status,
            chunk_scores,
            strengths,
            weaknesses,
            lowest_chunk,
            highest_chunk,
        }
    }

    fn fuse_dimensions(&self, stored: &[&StoredRating]) -> BTreeMap<String, Option<f64>> {
        // normalized name → (display name, values in chunk order)
        let mut groups: BTreeMap<String, (String, Vec<f64>)> = BTreeMap::new();
        for name in &self.config.expected_dimensions {
            groups
                .entry(normalize_label(name))
                .or_insert_with(|| (name.clone(), Vec::new()));
        }
        for s in stored {
            for (name, score) in &s.rating.per_dimension_scores {
                groups
                    .entry(normalize_label(name))
                    .or_insert_with(|| (name.clone(), Vec::new()))
                    .1
                    .push(*score);
            }
        }
        groups
            .into_values()
            .map(|(display, values)| (display, mean(&values)))
            .collect()
    }
}

/// Batch convenience over already-validated sets
#[must_use]
pub fn fuse<'a>(
    config: &RatingConfig,
    total_chunks: usize,
    sets: impl IntoIterator<Item = &'a AnnotationSet>,
) -> RationalityProfile {
    let mut acc = RatingAccumulator::new(config, total_chunks);
    for set in sets {
        acc.fold(set);
    }
    acc.finalize()
}

fn fuse_overall(method: FusionMethod, stored: &[&StoredRating]) -> Option<f64> {
    let scores: Vec<f64> = stored.iter().map(|s| s.rating.overall_score).collect();
    match method {
        FusionMethod::Mean => mean(&scores),
        FusionMethod::TrimmedMean { trim_fraction } => {
            let mut sorted = scores;
            sorted.sort_by(f64::total_cmp);
            #[allow(
                clippy::cast_precision_loss,
                clippy::cast_possible_truncation,
                clippy::cast_sign_loss
            )]
            let trim = (sorted.len() as f64 * trim_fraction).floor() as usize;
            if trim * 2 >= sorted.len() {
                mean(&sorted)
            } else {
                mean(&sorted[trim..sorted.len() - trim])
            }
        }
        FusionMethod::LengthWeighted => {
            #[allow(clippy::cast_precision_loss)]
            let total_weight: f64 = stored.iter().map(|s| s.chunk_chars as f64).sum();
            if total_weight <= 0.0 {
                return mean(&scores);
            }
            #[allow(clippy::cast_precision_loss)]
            let weighted: f64 = stored
                .iter()
                .map(|s| s.rating.overall_score * s.chunk_chars as f64)
                .sum();
            Some(weighted / total_weight)
        }
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    #[allow(clippy::cast_precision_loss)]
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Round half away from zero, kept inside the score range
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn round_score(mean: f64) -> u8 {
    mean.round().clamp(SCORE_RANGE.0, SCORE_RANGE.1) as u8
}
