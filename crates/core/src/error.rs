use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Error, Debug)]
pub enum CoreError {
    /// The analyzer payload cannot be read with the expected schema at all.
    /// Fatal for a run: silently misparsing it would corrupt every count.
    #[error("Schema version mismatch in chunk {chunk_index}: {detail}")]
    SchemaVersionMismatch { chunk_index: usize, detail: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CoreError {
    pub fn schema_mismatch(chunk_index: usize, detail: impl Into<String>) -> Self {
        Self::SchemaVersionMismatch {
            chunk_index,
            detail: detail.into(),
        }
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}
