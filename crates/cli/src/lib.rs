use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use reasonscan_chunker::{
    ChunkBound, Chunker, ChunkerConfig, Transcript, TranscriptChunk, TranscriptCleaner,
};
use reasonscan_core::{validate_payload, JsonFormatter, ReportFormatter};
use reasonscan_pipeline::{AnalysisRun, Analyzer, RunOutcome};
use serde::Serialize;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::analyzers::{CommandAnalyzer, PayloadDirAnalyzer};
use crate::config::ReasonscanConfig;
use crate::report::MarkdownFormatter;

pub mod analyzers;
pub mod config;
pub mod report;

/// Source label used for transcripts read from stdin
pub const PASTED_TEXT_LABEL: &str = "Pasted text";

fn print_stdout(text: &str) -> Result<()> {
    use std::io::Write;

    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout
        .write_all(text.as_bytes())
        .and_then(|_| stdout.write_all(b"\n"))
        .and_then(|_| stdout.flush())
    {
        if err.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(err.into());
    }
    Ok(())
}

#[derive(Parser)]
#[command(name = "reasonscan")]
#[command(about = "Structural reasoning analysis for long transcripts", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Split a transcript into chunks and print the plan
    Chunk(ChunkArgs),

    /// Validate one raw analyzer payload and print the result as JSON
    Validate(ValidateArgs),

    /// Analyze a transcript end to end and render the lesson report
    Analyze(AnalyzeArgs),
}

#[derive(Args, Clone, Copy)]
struct SizeArgs {
    /// Maximum characters per chunk
    #[arg(long, conflicts_with = "max_tokens")]
    max_chars: Option<usize>,

    /// Maximum estimated tokens per chunk (~4 characters per token)
    #[arg(long)]
    max_tokens: Option<usize>,
}

impl SizeArgs {
    fn apply(self, config: &mut ChunkerConfig) {
        if let Some(n) = self.max_chars {
            *config = ChunkerConfig::with_max_chars(n);
        } else if let Some(n) = self.max_tokens {
            *config = ChunkerConfig::with_max_tokens(n);
        }
    }
}

#[derive(Args)]
struct ChunkArgs {
    /// Transcript file, or `-` for stdin
    input: PathBuf,

    #[command(flatten)]
    size: SizeArgs,

    /// Drop sponsor/housekeeping sentences before chunking
    #[arg(long)]
    clean: bool,

    /// Configuration file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output JSON instead of a table
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct ValidateArgs {
    /// Raw payload (JSON)
    payload: PathBuf,

    /// Chunk index the payload belongs to
    #[arg(long, default_value_t = 0)]
    chunk_index: usize,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Markdown,
    Json,
}

#[derive(Args)]
struct AnalyzeArgs {
    /// Transcript file, or `-` for stdin
    input: PathBuf,

    /// Directory of pre-computed payloads named chunk-0000.json, chunk-0001.json, ...
    #[arg(long, conflicts_with = "analyzer_cmd", required_unless_present = "analyzer_cmd")]
    payload_dir: Option<PathBuf>,

    /// Shell command run per chunk: chunk text on stdin, JSON payload on stdout
    #[arg(long)]
    analyzer_cmd: Option<String>,

    /// Configuration file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Extra alias table (TOML) merged over the defaults
    #[arg(long)]
    aliases: Option<PathBuf>,

    /// Do not load the built-in alias table
    #[arg(long)]
    no_default_aliases: bool,

    #[command(flatten)]
    size: SizeArgs,

    /// Drop sponsor/housekeeping sentences before chunking
    #[arg(long)]
    clean: bool,

    /// Analyzer calls in flight at once
    #[arg(long)]
    concurrency: Option<usize>,

    /// Stop waiting after this many seconds and report with partial coverage
    #[arg(long)]
    finalize_after: Option<u64>,

    /// Report format
    #[arg(long, value_enum, default_value_t = OutputFormat::Markdown)]
    format: OutputFormat,

    /// Write the report to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Omit per-chunk details from the Markdown report
    #[arg(long)]
    summary_only: bool,

    /// Transcript identifier (default: file stem)
    #[arg(long)]
    id: Option<String>,

    /// Transcript title (default: file stem)
    #[arg(long)]
    title: Option<String>,

    /// Source label, e.g. a URL (default: file path, or "Pasted text" for stdin)
    #[arg(long)]
    source: Option<String>,
}

pub async fn main_entry() -> Result<()> {
    let mut cli = Cli::parse();

    // Keep stdout clean for machine-readable output
    let json_output = match &cli.command {
        Commands::Chunk(args) => args.json,
        Commands::Validate(_) => true,
        Commands::Analyze(args) => args.format == OutputFormat::Json && args.output.is_none(),
    };
    if json_output {
        cli.quiet = true;
    }

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    match cli.command {
        Commands::Chunk(args) => run_chunk(args)?,
        Commands::Validate(args) => run_validate(&args)?,
        Commands::Analyze(args) => run_analyze(args).await?,
    }

    Ok(())
}

fn read_transcript(
    input: &Path,
    id: Option<String>,
    title: Option<String>,
    source: Option<String>,
) -> Result<Transcript> {
    let from_stdin = input.as_os_str() == "-";
    let text = if from_stdin {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read transcript from stdin")?;
        buf
    } else {
        fs::read_to_string(input)
            .with_context(|| format!("Failed to read transcript {}", input.display()))?
    };

    let stem = if from_stdin {
        "stdin".to_string()
    } else {
        input
            .file_stem()
            .map_or_else(|| "transcript".to_string(), |s| s.to_string_lossy().into_owned())
    };
    let source = source.unwrap_or_else(|| {
        if from_stdin {
            PASTED_TEXT_LABEL.to_string()
        } else {
            input.display().to_string()
        }
    });

    Ok(Transcript::new(
        id.unwrap_or_else(|| stem.clone()),
        title.unwrap_or(stem),
        text,
    )
    .with_source(source))
}

fn prepare_chunks(
    transcript: Transcript,
    config: &ReasonscanConfig,
    clean: bool,
) -> Result<(Transcript, Vec<TranscriptChunk>)> {
    let transcript = if clean || config.cleaning.enabled {
        let cleaner =
            TranscriptCleaner::new(&config.cleaning).context("Invalid cleaning phrases")?;
        let cleaned = cleaner.clean(&transcript);
        log::info!(
            "cleaning removed {} sentence(s){}",
            cleaned.removed_sentences,
            if cleaned.fell_back { " (kept original: nothing would remain)" } else { "" }
        );
        cleaned.transcript
    } else {
        transcript
    };

    let chunker = Chunker::new(config.chunker.clone()).context("Invalid chunker configuration")?;
    let chunks = chunker.chunk(&transcript);
    log::info!(
        "'{}': {} chunk(s) at {} {}",
        transcript.label(),
        chunks.len(),
        config.chunker.bound.limit(),
        config.chunker.bound.unit()
    );
    Ok((transcript, chunks))
}

#[derive(Serialize)]
struct ChunkPlan<'a> {
    id: &'a str,
    title: &'a str,
    source: Option<&'a str>,
    bound: ChunkBound,
    chunks: &'a [TranscriptChunk],
}

fn run_chunk(args: ChunkArgs) -> Result<()> {
    let mut config = ReasonscanConfig::load_or_default(args.config.as_deref())?;
    args.size.apply(&mut config.chunker);
    config.validate()?;

    let transcript = read_transcript(&args.input, None, None, None)?;
    let (transcript, chunks) = prepare_chunks(transcript, &config, args.clean)?;

    if args.json {
        let plan = ChunkPlan {
            id: &transcript.id,
            title: &transcript.title,
            source: transcript.source.as_deref(),
            bound: config.chunker.bound,
            chunks: &chunks,
        };
        return print_stdout(&serde_json::to_string_pretty(&plan)?);
    }

    let total = chunks.len();
    let mut out = String::new();
    for (position, chunk) in chunks.iter().enumerate() {
        let preview: String = chunk.text.split_whitespace().collect::<Vec<_>>().join(" ");
        let preview: String = preview.chars().take(60).collect();
        out.push_str(&format!(
            "Section {} of {total}\tbytes {}..{}\t{} chars\t~{} tokens\t{preview}\n",
            position + 1,
            chunk.start_offset,
            chunk.end_offset,
            chunk.char_len(),
            chunk.estimated_tokens
        ));
    }
    print_stdout(out.trim_end())
}

fn run_validate(args: &ValidateArgs) -> Result<()> {
    let raw = fs::read_to_string(&args.payload)
        .with_context(|| format!("Failed to read payload {}", args.payload.display()))?;
    let value: serde_json::Value = serde_json::from_str(&raw)
        .with_context(|| format!("Payload {} is not valid JSON", args.payload.display()))?;

    let chunk = TranscriptChunk::new(args.chunk_index, 0, String::new());
    let set = validate_payload(&chunk, &value)?;
    print_stdout(&serde_json::to_string_pretty(&set)?)
}

fn build_analyzer(args: &AnalyzeArgs) -> Result<Arc<dyn Analyzer>> {
    match (&args.payload_dir, &args.analyzer_cmd) {
        (Some(dir), None) => {
            if !dir.is_dir() {
                bail!("Payload directory {} does not exist", dir.display());
            }
            Ok(Arc::new(PayloadDirAnalyzer::new(dir)))
        }
        (None, Some(cmd)) => Ok(Arc::new(CommandAnalyzer::new(cmd.clone()))),
        _ => bail!("Exactly one of --payload-dir or --analyzer-cmd is required"),
    }
}

async fn run_analyze(args: AnalyzeArgs) -> Result<()> {
    let mut config = ReasonscanConfig::load_or_default(args.config.as_deref())?;
    args.size.apply(&mut config.chunker);
    if let Some(concurrency) = args.concurrency {
        config.run.concurrency = concurrency;
    }
    config.resolve_aliases(!args.no_default_aliases, args.aliases.as_deref())?;
    config.validate()?;

    let analyzer = build_analyzer(&args)?;
    let transcript = read_transcript(
        &args.input,
        args.id.clone(),
        args.title.clone(),
        args.source.clone(),
    )?;
    let (transcript, chunks) = prepare_chunks(transcript, &config, args.clean)?;

    let run = AnalysisRun::new(analyzer)
        .with_run_config(config.run.clone())
        .with_taxonomy(config.taxonomy.clone())
        .with_rating(config.rating.clone());
    let outcome = drive_run(&run, transcript, chunks, args.finalize_after).await?;

    let coverage = &outcome.report.coverage;
    if coverage.incomplete_coverage {
        log::warn!(
            "incomplete coverage: {} of {} chunk(s) degraded",
            coverage.degraded_chunks,
            coverage.total_chunks
        );
    }

    let formatter: Box<dyn ReportFormatter> = match args.format {
        OutputFormat::Markdown => Box::new(MarkdownFormatter {
            chunk_details: !args.summary_only,
        }),
        OutputFormat::Json => Box::new(JsonFormatter { pretty: true }),
    };
    let rendered = formatter.render(&outcome.report)?;

    match &args.output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, &rendered)
                .with_context(|| format!("Failed to write report {}", path.display()))?;
            log::info!("{} report written to {}", formatter.name(), path.display());
            Ok(())
        }
        None => print_stdout(rendered.trim_end()),
    }
}

/// Resolves once the signal fires. A handler that cannot be installed never
/// resolves, so the run waits for its other exits.
async fn interrupted(signal: impl std::future::Future<Output = io::Result<()>>) {
    match signal.await {
        Ok(()) => {}
        Err(err) => {
            log::warn!("cannot listen for Ctrl-C: {err}");
            std::future::pending::<()>().await;
        }
    }
}

/// Wait for the barrier, or finalize early on Ctrl-C or the deadline
async fn drive_run(
    run: &AnalysisRun,
    transcript: Transcript,
    chunks: Vec<TranscriptChunk>,
    finalize_after: Option<u64>,
) -> Result<RunOutcome> {
    let handle = run.start(transcript, chunks)?;
    let mut progress = handle.progress();
    let deadline = async {
        match finalize_after {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        _ = progress.wait_for(|p| p.finished) => {}
        () = interrupted(tokio::signal::ctrl_c()) => {
            log::warn!("interrupted: finalizing with partial coverage");
            handle.finalize_partial().await;
        }
        () = deadline => {
            log::warn!("deadline reached: finalizing with partial coverage");
            handle.finalize_partial().await;
        }
    }

    Ok(handle.wait().await?)
}
