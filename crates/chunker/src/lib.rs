//! # Reasonscan Chunker
//!
//! Splits long transcripts into bounded, ordered segments for per-section
//! reasoning analysis.
//!
//! ## Guarantees
//!
//! The chunker produces segments that:
//! - Never overlap and never leave gaps: concatenating every chunk's text
//!   reproduces the transcript byte-for-byte
//! - Are never empty
//! - Break on sentence or utterance boundaries when possible, then on word
//!   boundaries, and only split a word when that single word exceeds the bound
//! - Are deterministic for identical input and bound
//!
//! ## Architecture
//!
//! ```text
//! Transcript
//!     │
//!     ├──> (optional) TranscriptCleaner
//!     │    ├─> collapse whitespace
//!     │    └─> drop sponsor / housekeeping sentences
//!     │
//!     ├──> Segmentation (UAX #29 sentence bounds)
//!     │
//!     └──> Packing
//!          ├─> Greedily fill up to the size bound
//!          ├─> Oversized sentence → word bounds → graphemes
//!          └─> Emit TranscriptChunk[] with byte offsets
//! ```
//!
//! ## Example
//!
//! ```rust
//! use reasonscan_chunker::{ChunkBound, Chunker, ChunkerConfig};
//!
//! let chunker = Chunker::new(ChunkerConfig {
//!     bound: ChunkBound::Chars(40),
//! })
//! .unwrap();
//!
//! let text = "Everyone agrees with this. So should you. Experts are never wrong.";
//! let chunks = chunker.chunk_str(text);
//!
//! let rebuilt: String = chunks.iter().map(|c| c.text.as_str()).collect();
//! assert_eq!(rebuilt, text);
//! ```

mod chunker;
mod cleaner;
mod config;
mod error;
mod segment;
mod types;

pub use chunker::Chunker;
pub use cleaner::{CleanedTranscript, CleaningConfig, TranscriptCleaner, DEFAULT_HOUSEKEEPING_PHRASES};
pub use config::{ChunkBound, ChunkerConfig};
pub use error::{ChunkerError, Result};
pub use types::{estimate_tokens, Transcript, TranscriptChunk};
