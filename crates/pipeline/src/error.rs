use reasonscan_chunker::ChunkerError;
use reasonscan_core::CoreError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Why one analyzer attempt produced no payload
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalyzerError {
    #[error("analyzer timed out after {0} ms")]
    Timeout(u64),

    #[error("analyzer failed: {0}")]
    Failure(String),
}

impl AnalyzerError {
    pub fn failure(msg: impl Into<String>) -> Self {
        Self::Failure(msg.into())
    }
}

#[derive(Error, Debug)]
pub enum PipelineError {
    /// Fatal for the run; carries the offending chunk
    #[error("Schema version mismatch in chunk {chunk_index}: {detail}")]
    SchemaVersionMismatch { chunk_index: usize, detail: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Chunker error: {0}")]
    Chunker(#[from] ChunkerError),

    #[error("Core error: {0}")]
    Core(CoreError),

    #[error("Run control error: {0}")]
    Control(String),
}

impl PipelineError {
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}

impl From<CoreError> for PipelineError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::SchemaVersionMismatch {
                chunk_index,
                detail,
            } => Self::SchemaVersionMismatch {
                chunk_index,
                detail,
            },
            CoreError::InvalidConfig(msg) => Self::InvalidConfig(msg),
            other => Self::Core(other),
        }
    }
}
