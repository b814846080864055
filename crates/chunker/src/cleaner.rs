use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

use crate::error::Result;
use crate::types::Transcript;

/// Sponsor reads and channel housekeeping that carry no argument content
pub const DEFAULT_HOUSEKEEPING_PHRASES: &[&str] = &[
    "this video is sponsored by",
    "our sponsor today",
    "thanks to our sponsor",
    "use code",
    "link in the description",
    "smash that like button",
    "hit that like button",
    "hit the subscribe button",
    "remember to subscribe",
    "click the bell",
    "follow me on",
    "check out my merch",
    "patreon.com",
    "before we get started",
    "quick word from our sponsor",
    "and now back to the video",
];

/// Configuration for the optional pre-chunking cleanup pass
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CleaningConfig {
    /// Run the cleaner before chunking
    pub enabled: bool,

    /// Replace every whitespace run with a single space
    pub collapse_whitespace: bool,

    /// Case-insensitive phrases; a sentence containing any of them is dropped
    pub phrases: Vec<String>,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            collapse_whitespace: true,
            phrases: DEFAULT_HOUSEKEEPING_PHRASES
                .iter()
                .map(|p| (*p).to_string())
                .collect(),
        }
    }
}

/// Result of a cleaning pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanedTranscript {
    pub transcript: Transcript,
    pub removed_sentences: usize,
    /// True when every sentence matched and the input was kept as-is
    pub fell_back: bool,
}

/// Removes sponsor/housekeeping sentences and normalizes whitespace
#[derive(Debug, Clone)]
pub struct TranscriptCleaner {
    collapse_whitespace: bool,
    matcher: Option<Regex>,
    whitespace: Regex,
}

impl TranscriptCleaner {
    pub fn new(config: &CleaningConfig) -> Result<Self> {
        let alternatives: Vec<String> = config
            .phrases
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .map(regex::escape)
            .collect();

        let matcher = if alternatives.is_empty() {
            None
        } else {
            Some(
                RegexBuilder::new(&alternatives.join("|"))
                    .case_insensitive(true)
                    .build()?,
            )
        };

        Ok(Self {
            collapse_whitespace: config.collapse_whitespace,
            matcher,
            whitespace: Regex::new(r"\s+")?,
        })
    }

    /// Produce a cleaned copy of the transcript. Metadata is preserved.
    #[must_use]
    pub fn clean(&self, transcript: &Transcript) -> CleanedTranscript {
        let normalized = if self.collapse_whitespace {
            self.whitespace
                .replace_all(&transcript.text, " ")
                .trim()
                .to_string()
        } else {
            transcript.text.clone()
        };

        let mut kept = String::with_capacity(normalized.len());
        let mut kept_any = false;
        let mut removed = 0usize;

        for sentence in normalized.split_sentence_bounds() {
            let is_housekeeping = self
                .matcher
                .as_ref()
                .is_some_and(|m| m.is_match(sentence));
            if is_housekeeping {
                removed += 1;
                continue;
            }
            if !sentence.trim().is_empty() {
                kept_any = true;
            }
            kept.push_str(sentence);
        }

        if removed > 0 && !kept_any {
            log::warn!(
                "Cleaning would remove every sentence of '{}'; keeping the original text",
                transcript.id
            );
            return CleanedTranscript {
                transcript: transcript.clone(),
                removed_sentences: 0,
                fell_back: true,
            };
        }

        if removed > 0 {
            log::info!("Removed {removed} housekeeping sentences from '{}'", transcript.id);
        }

        let text = if self.collapse_whitespace {
            kept.trim_end().to_string()
        } else {
            kept
        };

        CleanedTranscript {
            transcript: Transcript {
                text,
                ..transcript.clone()
            },
            removed_sentences: removed,
            fell_back: false,
        }
    }
}
