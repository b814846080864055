//! Analyzer backends available from the command line.
//!
//! - [`PayloadDirAnalyzer`]: pre-computed payloads, `chunk-0000.json`, ...
//! - [`CommandAnalyzer`]: an external program, chunk text on stdin, JSON
//!   payload on stdout

use async_trait::async_trait;
use reasonscan_pipeline::{AnalysisRequest, Analyzer, AnalyzerError};
use serde_json::Value;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// File name holding the payload for a chunk
#[must_use]
pub fn payload_file_name(chunk_index: usize) -> String {
    format!("chunk-{chunk_index:04}.json")
}

fn parse_payload(raw: &[u8], origin: &str) -> Result<Value, AnalyzerError> {
    serde_json::from_slice(raw)
        .map_err(|e| AnalyzerError::failure(format!("{origin} is not valid JSON: {e}")))
}

pub struct PayloadDirAnalyzer {
    dir: PathBuf,
}

impl PayloadDirAnalyzer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn path_for(&self, chunk_index: usize) -> PathBuf {
        self.dir.join(payload_file_name(chunk_index))
    }
}

#[async_trait]
impl Analyzer for PayloadDirAnalyzer {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<Value, AnalyzerError> {
        let path = self.path_for(request.chunk.order_index);
        let raw = tokio::fs::read(&path)
            .await
            .map_err(|e| AnalyzerError::failure(format!("cannot read {}: {e}", path.display())))?;
        parse_payload(&raw, &path.display().to_string())
    }

    fn name(&self) -> &str {
        "payload-dir"
    }
}

/// Runs a shell command once per attempt.
///
/// The chunk text is written to stdin. Positioning is passed through the
/// environment: `REASONSCAN_SECTION` ("Section i of N"), `REASONSCAN_CHUNK_INDEX`,
/// `REASONSCAN_TOTAL_CHUNKS` and `REASONSCAN_SOURCE`.
pub struct CommandAnalyzer {
    command_line: String,
}

impl CommandAnalyzer {
    pub fn new(command_line: impl Into<String>) -> Self {
        Self {
            command_line: command_line.into(),
        }
    }

    fn shell(&self) -> Command {
        #[cfg(windows)]
        let mut cmd = Command::new("cmd");
        #[cfg(windows)]
        cmd.arg("/C");
        #[cfg(not(windows))]
        let mut cmd = Command::new("sh");
        #[cfg(not(windows))]
        cmd.arg("-c");
        cmd.arg(&self.command_line);
        cmd
    }
}

#[async_trait]
impl Analyzer for CommandAnalyzer {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<Value, AnalyzerError> {
        let mut child = self
            .shell()
            .env("REASONSCAN_SECTION", request.section_header())
            .env("REASONSCAN_CHUNK_INDEX", request.chunk.order_index.to_string())
            .env("REASONSCAN_TOTAL_CHUNKS", request.total_chunks.to_string())
            .env("REASONSCAN_SOURCE", &request.source_label)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AnalyzerError::failure(format!("cannot spawn `{}`: {e}", self.command_line)))?;

        if let Some(mut stdin) = child.stdin.take() {
            // A command that ignores stdin may close it early
            if let Err(e) = stdin.write_all(request.chunk.text.as_bytes()).await {
                log::debug!("chunk {}: stdin not fully written: {e}", request.chunk.order_index);
            }
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| AnalyzerError::failure(format!("`{}` failed: {e}", self.command_line)))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AnalyzerError::failure(format!(
                "`{}` exited with {}: {}",
                self.command_line,
                output.status,
                stderr.trim()
            )));
        }
        parse_payload(&output.stdout, "analyzer output")
    }

    fn name(&self) -> &str {
        "command"
    }
}
