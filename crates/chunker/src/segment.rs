use unicode_segmentation::UnicodeSegmentation;

/// A contiguous byte range of the transcript with its character count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Piece {
    pub start: usize,
    pub end: usize,
    pub chars: usize,
}

impl Piece {
    fn new(base: usize, offset: usize, text: &str) -> Self {
        let start = base + offset;
        Self {
            start,
            end: start + text.len(),
            chars: text.chars().count(),
        }
    }
}

/// Granularity of a split, from most to least preferred break point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Granularity {
    Sentence,
    Word,
    Grapheme,
}

impl Granularity {
    pub(crate) const fn finer(self) -> Option<Self> {
        match self {
            Self::Sentence => Some(Self::Word),
            Self::Word => Some(Self::Grapheme),
            Self::Grapheme => None,
        }
    }
}

/// Split `text` (located at byte offset `base` in the transcript) into
/// contiguous pieces. The pieces always tile `text` exactly.
pub(crate) fn split(text: &str, base: usize, granularity: Granularity) -> Vec<Piece> {
    match granularity {
        // UAX #29 sentence bounds keep trailing whitespace with the sentence and
        // break after line separators, which is where speaker turns end.
        Granularity::Sentence => text
            .split_sentence_bound_indices()
            .map(|(offset, s)| Piece::new(base, offset, s))
            .collect(),
        Granularity::Word => text
            .split_word_bound_indices()
            .map(|(offset, s)| Piece::new(base, offset, s))
            .collect(),
        Granularity::Grapheme => text
            .grapheme_indices(true)
            .map(|(offset, s)| Piece::new(base, offset, s))
            .collect(),
    }
}
