//! # Reasonscan Core
//!
//! Deterministic aggregation of per-chunk reasoning annotations into
//! lesson-level artifacts.
//!
//! ## Architecture
//!
//! ```text
//! raw payload (per chunk, from an analyzer)
//!     │
//!     ├──> validate_payload ──> AnnotationSet (+ warnings)
//!     │                              │
//!     │              ┌───────────────┴───────────────┐
//!     │              ▼                               ▼
//!     │     TaxonomyAccumulator              RatingAccumulator
//!     │     (alias collapse, distinct-       (stored per chunk,
//!     │      chunk counts, severities)        fused at finalize)
//!     │              │                               │
//!     │              └───────────────┬───────────────┘
//!     │                              ▼
//!     └──────────────────────> compose_report ──> LessonReport
//!                                                     │
//!                                              ReportFormatter
//! ```
//!
//! Accumulators are single-writer: each run owns its own and folds chunk
//! results one at a time, in any order.
//!
//! ## Example
//!
//! ```rust
//! use reasonscan_chunker::TranscriptChunk;
//! use reasonscan_core::{validate_payload, aggregate, TaxonomyConfig};
//! use serde_json::json;
//!
//! let chunk = TranscriptChunk::new(0, 0, "Everyone is switching.".to_string());
//! let raw = json!({
//!     "rhetorical_tactics": [
//!         { "name": "Bandwagon", "rationale": "appeals to popularity", "severity": "Medium" }
//!     ],
//!     "rationality": { "overall_score": 3 }
//! });
//!
//! let set = validate_payload(&chunk, &raw).unwrap();
//! let snapshot = aggregate(&TaxonomyConfig::default(), [&set]);
//! assert_eq!(snapshot.entries[0].chunk_count, 1);
//! ```

mod aliases;
mod error;
mod model;
mod narrative;
mod rating;
mod report;
mod taxonomy;
mod validator;

pub use aliases::{collapse_whitespace, normalize_label, AliasTable, RawAliasTable, ResolvedName};
pub use error::{CoreError, Result};
pub use model::{
    score_in_range, Annotation, AnnotationSet, ArgumentMapEntry, ChunkOutcome, DegradedChunk,
    Domain, RationalityRating, Severity, ValidationWarning, WarningKind, SCORE_RANGE,
};
pub use narrative::{narrate, NarrativeSummary};
pub use rating::{
    fuse, ChunkScore, FusionMethod, ProfileStatus, RatingAccumulator, RatingConfig,
    RationalityProfile, DEFAULT_DIMENSIONS,
};
pub use report::{
    compose_report, ChunkReport, ChunkStatus, CoverageSummary, Degradation, DetectedRow,
    JsonFormatter, LessonReport, ReportFormatter, ReportInputs, SourceInfo, TaxonomyRow,
    MISSING_OUTCOME_REASON, REPORT_SCHEMA_VERSION,
};
pub use taxonomy::{
    aggregate, Excerpt, FrequencyLabel, FrequencyThresholds, MasterTaxonomyEntry,
    TaxonomyAccumulator, TaxonomyConfig, TaxonomySnapshot,
};
pub use validator::{validate_payload, SUPPORTED_SCHEMA_VERSION};
