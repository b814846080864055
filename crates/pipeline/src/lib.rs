//! # Reasonscan Pipeline
//!
//! Drives the external analyzer over every chunk of a transcript and feeds
//! the results to the aggregation engine.
//!
//! - [`Analyzer`] is the capability boundary: any backend producing a raw
//!   JSON payload per chunk can be plugged in.
//! - Calls run concurrently (bounded by a semaphore), each attempt under a
//!   timeout, with exponential-backoff retries. A chunk that still fails is
//!   marked degraded; it never fails the run.
//! - One aggregation worker owns the taxonomy and rating accumulators.
//! - The report is composed after every chunk reported, or earlier on
//!   [`RunHandle::finalize_partial`].
//! - A payload with an incompatible schema aborts the run.

mod analyzer;
mod error;
mod retry;
mod run;

pub use analyzer::{AnalysisRequest, Analyzer};
pub use error::{AnalyzerError, PipelineError, Result};
pub use retry::{analyze_with_retry, AttemptReport, RetryPolicy};
pub use run::{
    AnalysisRun, RunConfig, RunHandle, RunOutcome, RunProgress, FINALIZED_EARLY_REASON,
    TASK_LOST_REASON,
};
