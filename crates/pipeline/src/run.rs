//! One analysis run: concurrent per-chunk analysis feeding a single
//! aggregation worker.
//!
//! ```text
//! chunk tasks (≤ concurrency)          aggregation worker (single writer)
//!   analyze_with_retry ──mpsc──>  validate → taxonomy.fold / rating.fold
//!   analyze_with_retry ──mpsc──>           │
//!   ...                                    ├─ all chunks reported (barrier)
//!                                          ├─ FinalizePartial command
//!                                          └─ schema mismatch → abort run
//! ```

use reasonscan_chunker::{Transcript, TranscriptChunk};
use reasonscan_core::{
    compose_report, validate_payload, ChunkOutcome, DegradedChunk, FrequencyThresholds, LessonReport,
    RatingAccumulator, RatingConfig, RationalityProfile, ReportInputs, TaxonomyAccumulator,
    TaxonomyConfig, TaxonomySnapshot,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Semaphore};
use tokio::task::{JoinHandle, JoinSet};

use crate::analyzer::{AnalysisRequest, Analyzer};
use crate::error::{AnalyzerError, PipelineError, Result};
use crate::retry::{analyze_with_retry, RetryPolicy};

/// Degradation reason for chunks cut off by a partial finalize
pub const FINALIZED_EARLY_REASON: &str = "finalized before analysis completed";

/// Degradation reason for chunks whose task ended without reporting
pub const TASK_LOST_REASON: &str = "analysis task ended without a result";

const MAX_CONCURRENCY: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Analyzer calls in flight at once
    pub concurrency: usize,

    pub retry: RetryPolicy,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            retry: RetryPolicy::default(),
        }
    }
}

impl RunConfig {
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 || self.concurrency > MAX_CONCURRENCY {
            return Err(PipelineError::invalid_config(format!(
                "concurrency must be in 1..={MAX_CONCURRENCY}, got {}",
                self.concurrency
            )));
        }
        self.retry.validate()
    }
}

/// Observable run state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RunProgress {
    pub total: usize,
    /// Chunks with a final outcome, degraded included
    pub completed: usize,
    pub degraded: usize,
    pub finished: bool,
}

/// Everything a finished run produced
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// One outcome per chunk, in chunk order
    pub outcomes: Vec<ChunkOutcome>,
    pub taxonomy: TaxonomySnapshot,
    pub profile: RationalityProfile,
    pub report: LessonReport,
    /// Set when a partial finalize cut the run short
    pub finalized_early: bool,
}

enum RunCommand {
    FinalizePartial,
}

struct ChunkResult {
    chunk_index: usize,
    attempts: u32,
    result: std::result::Result<Value, AnalyzerError>,
}

/// Run definition: analyzer plus configuration. Each `start` owns fresh
/// accumulators; nothing is shared between runs.
#[derive(Clone)]
pub struct AnalysisRun {
    analyzer: Arc<dyn Analyzer>,
    run: RunConfig,
    taxonomy: TaxonomyConfig,
    rating: RatingConfig,
}

impl AnalysisRun {
    pub fn new(analyzer: Arc<dyn Analyzer>) -> Self {
        Self {
            analyzer,
            run: RunConfig::default(),
            taxonomy: TaxonomyConfig::default(),
            rating: RatingConfig::default(),
        }
    }

    #[must_use]
    pub fn with_run_config(mut self, run: RunConfig) -> Self {
        self.run = run;
        self
    }

    #[must_use]
    pub fn with_taxonomy(mut self, taxonomy: TaxonomyConfig) -> Self {
        self.taxonomy = taxonomy;
        self
    }

    #[must_use]
    pub fn with_rating(mut self, rating: RatingConfig) -> Self {
        self.rating = rating;
        self
    }

    /// Analyze every chunk and wait for the barrier
    pub async fn execute(&self, transcript: Transcript, chunks: Vec<TranscriptChunk>) -> Result<RunOutcome> {
        self.start(transcript, chunks)?.wait().await
    }

    /// Spawn the run on the current tokio runtime
    pub fn start(&self, transcript: Transcript, chunks: Vec<TranscriptChunk>) -> Result<RunHandle> {
        self.run.validate()?;
        self.taxonomy.validate()?;
        self.rating.validate()?;

        let total = chunks.len();
        let (result_tx, result_rx) = mpsc::channel(total.max(1));
        let (command_tx, command_rx) = mpsc::channel(4);
        let (progress_tx, progress_rx) = watch::channel(RunProgress {
            total,
            ..RunProgress::default()
        });

        log::info!(
            "starting analysis of '{}': {total} chunk(s), concurrency {}",
            transcript.label(),
            self.run.concurrency
        );

        let tasks = spawn_chunk_tasks(
            &self.analyzer,
            &self.run,
            transcript.label(),
            &chunks,
            &result_tx,
        );
        drop(result_tx);

        let worker = Worker {
            transcript,
            chunks,
            taxonomy: TaxonomyAccumulator::new(&self.taxonomy),
            rating: RatingAccumulator::new(&self.rating, total),
            frequency: self.taxonomy.frequency,
            progress_tx,
            progress: RunProgress {
                total,
                ..RunProgress::default()
            },
        };
        let worker = tokio::spawn(worker.run(result_rx, command_rx, tasks));

        Ok(RunHandle {
            command_tx,
            progress_rx,
            worker,
        })
    }
}

/// Control surface of a started run
pub struct RunHandle {
    command_tx: mpsc::Sender<RunCommand>,
    progress_rx: watch::Receiver<RunProgress>,
    worker: JoinHandle<Result<RunOutcome>>,
}

impl RunHandle {
    #[must_use]
    pub fn progress(&self) -> watch::Receiver<RunProgress> {
        self.progress_rx.clone()
    }

    /// Ask the worker to stop waiting and report with whatever has arrived.
    /// A run that already finished is left as is.
    pub async fn finalize_partial(&self) {
        if self.command_tx.send(RunCommand::FinalizePartial).await.is_err() {
            log::debug!("finalize requested after the run already finished");
        }
    }

    /// Wait for the run to produce its outcome
    pub async fn wait(self) -> Result<RunOutcome> {
        self.worker
            .await
            .map_err(|e| PipelineError::Control(format!("aggregation worker failed: {e}")))?
    }
}

fn spawn_chunk_tasks(
    analyzer: &Arc<dyn Analyzer>,
    run: &RunConfig,
    source_label: &str,
    chunks: &[TranscriptChunk],
    result_tx: &mpsc::Sender<ChunkResult>,
) -> JoinSet<()> {
    let semaphore = Arc::new(Semaphore::new(run.concurrency));
    let policy = Arc::new(run.retry.clone());
    let total = chunks.len();
    let mut tasks = JoinSet::new();

    for (position, chunk) in chunks.iter().enumerate() {
        let request = AnalysisRequest {
            chunk: chunk.clone(),
            position,
            total_chunks: total,
            source_label: source_label.to_string(),
        };
        let analyzer = Arc::clone(analyzer);
        let semaphore = Arc::clone(&semaphore);
        let policy = Arc::clone(&policy);
        let tx = result_tx.clone();

        tasks.spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return;
            };
            log::debug!("analyzing {}", request.section_header());
            let report = analyze_with_retry(analyzer.as_ref(), &request, &policy).await;
            let _ = tx
                .send(ChunkResult {
                    chunk_index: request.chunk.order_index,
                    attempts: report.attempts,
                    result: report.result,
                })
                .await;
        });
    }
    tasks
}

struct Worker {
    transcript: Transcript,
    chunks: Vec<TranscriptChunk>,
    taxonomy: TaxonomyAccumulator,
    rating: RatingAccumulator,
    frequency: FrequencyThresholds,
    progress_tx: watch::Sender<RunProgress>,
    progress: RunProgress,
}

impl Worker {
    async fn run(
        mut self,
        mut result_rx: mpsc::Receiver<ChunkResult>,
        mut command_rx: mpsc::Receiver<RunCommand>,
        mut tasks: JoinSet<()>,
    ) -> Result<RunOutcome> {
        let by_index: BTreeMap<usize, usize> = self
            .chunks
            .iter()
            .enumerate()
            .map(|(pos, chunk)| (chunk.order_index, pos))
            .collect();
        let mut pending: BTreeSet<usize> = by_index.keys().copied().collect();
        let mut outcomes: BTreeMap<usize, ChunkOutcome> = BTreeMap::new();
        let mut finalized_early = false;

        while !pending.is_empty() {
            tokio::select! {
                biased;

                Some(command) = command_rx.recv() => match command {
                    RunCommand::FinalizePartial => {
                        log::info!(
                            "partial finalize requested with {} chunk(s) outstanding",
                            pending.len()
                        );
                        finalized_early = true;
                        break;
                    }
                },

                message = result_rx.recv() => {
                    let Some(message) = message else {
                        log::warn!("{} chunk task(s) ended without reporting", pending.len());
                        break;
                    };
                    if let Err(err) = self.accept(message, &by_index, &mut pending, &mut outcomes) {
                        return Err(self.abort(&mut tasks, err));
                    }
                }
            }
        }

        tasks.abort_all();
        // Results that arrived before the stop signal still count
        while let Ok(message) = result_rx.try_recv() {
            if let Err(err) = self.accept(message, &by_index, &mut pending, &mut outcomes) {
                return Err(self.abort(&mut tasks, err));
            }
        }

        let reason = if finalized_early {
            FINALIZED_EARLY_REASON
        } else {
            TASK_LOST_REASON
        };
        for chunk_index in pending {
            self.record(true);
            outcomes.insert(
                chunk_index,
                ChunkOutcome::Degraded(DegradedChunk {
                    chunk_index,
                    attempts: 0,
                    reason: reason.to_string(),
                }),
            );
        }

        let outcomes: Vec<ChunkOutcome> = outcomes.into_values().collect();
        let taxonomy = self.taxonomy.snapshot();
        let profile = self.rating.finalize();
        let report = compose_report(&ReportInputs {
            transcript: &self.transcript,
            chunks: &self.chunks,
            outcomes: &outcomes,
            taxonomy: &taxonomy,
            profile: &profile,
            frequency: self.frequency,
        });

        self.progress.finished = true;
        self.progress_tx.send_replace(self.progress);
        log::info!(
            "run finished: {} analyzed, {} degraded of {} chunk(s)",
            report.coverage.analyzed_chunks,
            report.coverage.degraded_chunks,
            report.coverage.total_chunks
        );

        Ok(RunOutcome {
            outcomes,
            taxonomy,
            profile,
            report,
            finalized_early,
        })
    }

    fn accept(
        &mut self,
        message: ChunkResult,
        by_index: &BTreeMap<usize, usize>,
        pending: &mut BTreeSet<usize>,
        outcomes: &mut BTreeMap<usize, ChunkOutcome>,
    ) -> Result<()> {
        if !pending.remove(&message.chunk_index) {
            log::warn!("unexpected result for chunk {}", message.chunk_index);
            return Ok(());
        }
        let Some(chunk) = by_index
            .get(&message.chunk_index)
            .and_then(|pos| self.chunks.get(*pos))
            .cloned()
        else {
            return Ok(());
        };
        let outcome = self.absorb(&chunk, message)?;
        outcomes.insert(outcome.chunk_index(), outcome);
        Ok(())
    }

    fn abort(&mut self, tasks: &mut JoinSet<()>, err: PipelineError) -> PipelineError {
        tasks.abort_all();
        self.progress.finished = true;
        self.progress_tx.send_replace(self.progress);
        log::error!("aborting run: {err}");
        err
    }

    /// Turn one analyzer result into a chunk outcome, folding it if usable
    fn absorb(&mut self, chunk: &TranscriptChunk, message: ChunkResult) -> Result<ChunkOutcome> {
        match message.result {
            Ok(payload) => {
                let set = validate_payload(chunk, &payload)?;
                self.taxonomy.fold(&set);
                self.rating.fold(&set);
                self.record(false);
                Ok(ChunkOutcome::Analyzed(set))
            }
            Err(err) => {
                log::warn!(
                    "chunk {} degraded after {} attempt(s): {err}",
                    message.chunk_index,
                    message.attempts
                );
                self.record(true);
                Ok(ChunkOutcome::Degraded(DegradedChunk {
                    chunk_index: message.chunk_index,
                    attempts: message.attempts,
                    reason: err.to_string(),
                }))
            }
        }
    }

    fn record(&mut self, degraded: bool) {
        self.progress.completed += 1;
        if degraded {
            self.progress.degraded += 1;
        }
        self.progress_tx.send_replace(self.progress);
    }
}
