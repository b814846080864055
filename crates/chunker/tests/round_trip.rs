use proptest::prelude::*;
use reasonscan_chunker::{Chunker, ChunkerConfig, Transcript};

fn transcript_text() -> impl Strategy<Value = String> {
    // Sentence-ish fragments with mixed punctuation, newlines and non-ASCII.
    prop::collection::vec(
        prop_oneof![
            "[A-Za-z]{1,12}",
            Just(" ".to_string()),
            Just(". ".to_string()),
            Just("? ".to_string()),
            Just("!\n".to_string()),
            Just("\n\n".to_string()),
            Just("naïve ".to_string()),
            Just("— ".to_string()),
            "[a-z]{20,40}",
        ],
        0..60,
    )
    .prop_map(|parts| parts.concat())
}

proptest! {
    #[test]
    fn concatenation_reconstructs_transcript(text in transcript_text(), bound in 1usize..80) {
        let chunker = Chunker::new(ChunkerConfig::with_max_chars(bound)).expect("valid config");
        let chunks = chunker.chunk_str(&text);

        let rebuilt: String = chunks.iter().map(|c| c.text.as_str()).collect();
        prop_assert_eq!(rebuilt, text.clone());

        for (idx, chunk) in chunks.iter().enumerate() {
            prop_assert!(!chunk.text.is_empty());
            prop_assert_eq!(chunk.order_index, idx);
            prop_assert_eq!(&text[chunk.start_offset..chunk.end_offset], chunk.text.as_str());
        }
        for pair in chunks.windows(2) {
            prop_assert_eq!(pair[0].end_offset, pair[1].start_offset);
        }
    }

    #[test]
    fn chunks_respect_char_bound_unless_single_grapheme(text in transcript_text(), bound in 2usize..80) {
        let chunker = Chunker::new(ChunkerConfig::with_max_chars(bound)).expect("valid config");
        for chunk in chunker.chunk_str(&text) {
            prop_assert!(chunk.char_len() <= bound, "chunk {:?} exceeds {}", chunk.text, bound);
        }
    }

    #[test]
    fn token_bound_round_trips(text in transcript_text(), bound in 1usize..20) {
        let chunker = Chunker::new(ChunkerConfig::with_max_tokens(bound)).expect("valid config");
        let transcript = Transcript::new("t", "prop", text.clone());
        let rebuilt: String = chunker.chunk(&transcript).iter().map(|c| c.text.as_str()).collect();
        prop_assert_eq!(rebuilt, text);
    }

    #[test]
    fn chunking_is_deterministic(text in transcript_text(), bound in 1usize..80) {
        let chunker = Chunker::new(ChunkerConfig::with_max_chars(bound)).expect("valid config");
        prop_assert_eq!(chunker.chunk_str(&text), chunker.chunk_str(&text));
    }
}

#[test]
fn empty_transcript_is_not_an_error() {
    let chunker = Chunker::new(ChunkerConfig::default()).expect("valid config");
    assert!(chunker.chunk(&Transcript::new("t", "empty", "")).is_empty());
}
