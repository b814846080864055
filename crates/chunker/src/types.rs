use serde::{Deserialize, Serialize};

/// Immutable source text plus identifying metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transcript {
    /// Stable identifier (video id, file stem, ...)
    pub id: String,

    /// Human-readable title
    pub title: String,

    /// Where the text came from (URL, "Pasted text", file path)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Full transcript text
    pub text: String,
}

impl Transcript {
    /// Create a transcript without a source label
    pub fn new(id: impl Into<String>, title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            source: None,
            text: text.into(),
        }
    }

    /// Builder: set source label
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Label used in reports: source, then title, then id
    #[must_use]
    pub fn label(&self) -> &str {
        self.source
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .or_else(|| Some(self.title.as_str()).filter(|t| !t.trim().is_empty()))
            .unwrap_or(&self.id)
    }
}

/// One bounded, ordered segment of a transcript
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TranscriptChunk {
    /// Position in the chunk sequence (0-based, monotonic, unique)
    pub order_index: usize,

    /// Byte offset of the first byte in the transcript
    pub start_offset: usize,

    /// Byte offset one past the last byte (exclusive)
    pub end_offset: usize,

    /// The chunk text, equal to `transcript[start_offset..end_offset]`
    pub text: String,

    /// Estimated token count (rough approximation)
    pub estimated_tokens: usize,
}

impl TranscriptChunk {
    /// Create a new chunk; token estimate is derived from the text
    #[must_use]
    pub fn new(order_index: usize, start_offset: usize, text: String) -> Self {
        let end_offset = start_offset + text.len();
        let estimated_tokens = estimate_tokens(&text);
        Self {
            order_index,
            start_offset,
            end_offset,
            text,
            estimated_tokens,
        }
    }

    /// Length in Unicode scalar values
    #[must_use]
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Estimate tokens from content (rough heuristic: ~4 characters per token)
#[must_use]
pub fn estimate_tokens(content: &str) -> usize {
    content.chars().count().div_ceil(4).max(1)
}
