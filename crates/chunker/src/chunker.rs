use crate::config::{ChunkBound, ChunkerConfig};
use crate::error::{ChunkerError, Result};
use crate::segment::{split, Granularity, Piece};
use crate::types::{Transcript, TranscriptChunk};

/// Main chunker interface for splitting transcripts
#[derive(Debug, Clone)]
pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    /// Create a new chunker with configuration
    pub fn new(config: ChunkerConfig) -> Result<Self> {
        config.validate().map_err(ChunkerError::invalid_config)?;
        Ok(Self { config })
    }

    #[must_use]
    pub const fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Chunk a transcript
    #[must_use]
    pub fn chunk(&self, transcript: &Transcript) -> Vec<TranscriptChunk> {
        self.chunk_str(&transcript.text)
    }

    /// Chunk raw text. An empty input yields an empty sequence.
    #[must_use]
    pub fn chunk_str(&self, text: &str) -> Vec<TranscriptChunk> {
        if text.is_empty() {
            return Vec::new();
        }

        let ranges = self.pack(text);
        let chunks: Vec<TranscriptChunk> = ranges
            .into_iter()
            .enumerate()
            .map(|(idx, (start, end))| TranscriptChunk::new(idx, start, text[start..end].to_string()))
            .collect();

        log::debug!(
            "Chunked {} chars into {} chunks (bound: {} {})",
            text.chars().count(),
            chunks.len(),
            self.config.bound.limit(),
            self.config.bound.unit()
        );

        chunks
    }

    /// Compute chunk byte ranges. Ranges tile `text` exactly.
    fn pack(&self, text: &str) -> Vec<(usize, usize)> {
        let bound = self.config.bound;
        let mut packer = Packer::new(bound);

        for sentence in split(text, 0, Granularity::Sentence) {
            if bound.fits_chars(sentence.chars) {
                packer.push(sentence);
            } else {
                // Oversized sentence: start fresh so the break before it stays a
                // sentence break, then fall back to finer boundaries inside it.
                packer.flush();
                self.push_oversized(&mut packer, text, sentence, Granularity::Word);
                packer.flush();
            }
        }

        packer.finish()
    }

    fn push_oversized(&self, packer: &mut Packer, text: &str, piece: Piece, granularity: Granularity) {
        let bound = self.config.bound;
        for part in split(&text[piece.start..piece.end], piece.start, granularity) {
            if bound.fits_chars(part.chars) {
                packer.push(part);
                continue;
            }
            match granularity.finer() {
                Some(finer) => self.push_oversized(packer, text, part, finer),
                // A single grapheme wider than the bound still has to go somewhere.
                None => {
                    packer.flush();
                    packer.push(part);
                    packer.flush();
                }
            }
        }
    }
}

/// Greedy accumulator of contiguous pieces
struct Packer {
    bound: ChunkBound,
    current: Option<(usize, usize, usize)>,
    out: Vec<(usize, usize)>,
}

impl Packer {
    const fn new(bound: ChunkBound) -> Self {
        Self {
            bound,
            current: None,
            out: Vec::new(),
        }
    }

    fn push(&mut self, piece: Piece) {
        match self.current {
            Some((start, end, chars)) if self.bound.fits_chars(chars + piece.chars) => {
                debug_assert_eq!(end, piece.start);
                self.current = Some((start, piece.end, chars + piece.chars));
            }
            Some(_) => {
                self.flush();
                self.current = Some((piece.start, piece.end, piece.chars));
            }
            None => self.current = Some((piece.start, piece.end, piece.chars)),
        }
    }

    fn flush(&mut self) {
        if let Some((start, end, _)) = self.current.take() {
            if end > start {
                self.out.push((start, end));
            }
        }
    }

    fn finish(mut self) -> Vec<(usize, usize)> {
        self.flush();
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn chunker(max_chars: usize) -> Chunker {
        Chunker::new(ChunkerConfig::with_max_chars(max_chars)).expect("valid config")
    }

    fn texts(chunks: &[TranscriptChunk]) -> Vec<&str> {
        chunks.iter().map(|c| c.text.as_str()).collect()
    }

    #[test]
    fn empty_transcript_yields_no_chunks() {
        assert!(chunker(100).chunk_str("").is_empty());
    }

    #[test]
    fn rejects_zero_bound() {
        assert!(Chunker::new(ChunkerConfig::with_max_chars(0)).is_err());
    }

    #[test]
    fn short_transcript_is_single_chunk() {
        let chunks = chunker(100).chunk_str("Short and sweet.");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].start_offset, 0);
        assert_eq!(chunks[0].end_offset, 16);
    }

    #[test]
    fn packs_whole_sentences_up_to_bound() {
        let text = "Everyone knows this. Only fools disagree. Trust me on that.";
        let chunks = chunker(45).chunk_str(text);
        assert_eq!(
            texts(&chunks),
            vec!["Everyone knows this. Only fools disagree. ", "Trust me on that."]
        );
        assert_eq!(chunks[1].order_index, 1);
        assert_eq!(chunks[1].start_offset, chunks[0].end_offset);
    }

    #[test]
    fn oversized_sentence_breaks_on_words() {
        let text = "Intro. This sentence is definitely much longer than the bound allows.";
        let chunks = chunker(20).chunk_str(text);

        assert_eq!(chunks[0].text, "Intro. ");
        for chunk in &chunks {
            assert!(chunk.char_len() <= 20, "chunk too long: {:?}", chunk.text);
        }
        // Every interior boundary lands next to whitespace, never inside a word.
        for pair in chunks.windows(2) {
            let left = pair[0].text.chars().last().unwrap_or(' ');
            let right = pair[1].text.chars().next().unwrap_or(' ');
            assert!(
                left.is_whitespace() || right.is_whitespace() || !left.is_alphanumeric() || !right.is_alphanumeric(),
                "mid-word split between {:?} and {:?}",
                pair[0].text,
                pair[1].text
            );
        }
        let rebuilt: String = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn overlong_word_falls_back_to_graphemes() {
        let text = "Supercalifragilistic";
        let chunks = chunker(8).chunk_str(text);
        assert_eq!(texts(&chunks), vec!["Supercal", "ifragili", "stic"]);
    }

    #[test]
    fn token_bound_uses_estimate() {
        let chunker = Chunker::new(ChunkerConfig::with_max_tokens(5)).expect("valid config");
        let text = "Alpha beta gamma. Delta epsilon zeta. Eta theta.";
        let chunks = chunker.chunk_str(text);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.estimated_tokens <= 5);
        }
    }

    #[test]
    fn deterministic_for_identical_input() {
        let text = "A said this. B said that.\nA replied! B shrugged?";
        let a = chunker(15).chunk_str(text);
        let b = chunker(15).chunk_str(text);
        assert_eq!(a, b);
    }
}
