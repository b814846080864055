use serde::{Deserialize, Serialize};


/// Configuration for transcript chunking
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkerConfig {
    /// Upper bound on the size of a single chunk
    pub bound: ChunkBound,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            bound: ChunkBound::Chars(1200),
        }
    }
}

impl ChunkerConfig {
    /// Create config bounded by a character count
    #[must_use]
    pub const fn with_max_chars(max_chars: usize) -> Self {
        Self {
            bound: ChunkBound::Chars(max_chars),
        }
    }

    /// Create config bounded by an estimated token count
    #[must_use]
    pub const fn with_max_tokens(max_tokens: usize) -> Self {
        Self {
            bound: ChunkBound::Tokens(max_tokens),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.bound.limit() == 0 {
            return Err(format!("{} bound must be > 0", self.bound.unit()));
        }
        Ok(())
    }
}

/// Size bound for a chunk, measured either in characters or estimated tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkBound {
    /// Unicode scalar values
    Chars(usize),

    /// Estimated tokens (~4 characters per token)
    Tokens(usize),
}

impl ChunkBound {
    #[must_use]
    pub const fn limit(self) -> usize {
        match self {
            Self::Chars(n) | Self::Tokens(n) => n,
        }
    }

    #[must_use]
    pub const fn unit(self) -> &'static str {
        match self {
            Self::Chars(_) => "chars",
            Self::Tokens(_) => "tokens",
        }
    }

    /// Whether a piece of text with `chars` Unicode scalar values fits
    #[must_use]
    pub fn fits_chars(self, chars: usize) -> bool {
        match self {
            Self::Chars(limit) => chars <= limit,
            Self::Tokens(limit) => chars.div_ceil(4).max(1) <= limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = ChunkerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.bound, ChunkBound::Chars(1200));
    }

    #[test]
    fn test_zero_bound_rejected() {
        assert!(ChunkerConfig::with_max_chars(0).validate().is_err());
        assert!(ChunkerConfig::with_max_tokens(0).validate().is_err());
        assert!(ChunkerConfig::with_max_tokens(256).validate().is_ok());
    }

    #[test]
    fn test_fits_chars_per_unit() {
        assert!(ChunkBound::Chars(11).fits_chars(11));
        assert!(!ChunkBound::Chars(10).fits_chars(11));
        assert!(ChunkBound::Tokens(3).fits_chars(11));
        assert!(!ChunkBound::Tokens(2).fits_chars(11));
    }

    #[test]
    fn test_bound_deserializes_from_toml_style_map() {
        let config: ChunkerConfig = serde_json::from_str(r#"{"bound":{"tokens":300}}"#)
            .expect("config parses");
        assert_eq!(config.bound, ChunkBound::Tokens(300));
    }
}
