use thiserror::Error;

/// Result type for chunker operations
pub type Result<T> = std::result::Result<T, ChunkerError>;

/// Errors that can occur while preparing or chunking a transcript
#[derive(Error, Debug)]
pub enum ChunkerError {
    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A cleaning phrase could not be compiled into a matcher
    #[error("Invalid cleaning pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

impl ChunkerError {
    /// Create an invalid config error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}
