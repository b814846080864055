use async_trait::async_trait;
use reasonscan_chunker::TranscriptChunk;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AnalyzerError;

/// Everything an analyzer is given for one chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub chunk: TranscriptChunk,

    /// 0-based position of the chunk in the run
    pub position: usize,

    pub total_chunks: usize,

    /// Transcript label (URL, "Pasted text", title)
    pub source_label: String,
}

impl AnalysisRequest {
    /// "Section i of N", 1-based
    #[must_use]
    pub fn section_header(&self) -> String {
        format!("Section {} of {}", self.position + 1, self.total_chunks)
    }
}

/// External collaborator producing a raw annotation payload for one chunk.
///
/// The payload is validated downstream; implementations only need to return
/// a parseable JSON container.
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<Value, AnalyzerError>;

    /// Short identifier for logs
    fn name(&self) -> &str {
        "analyzer"
    }
}
