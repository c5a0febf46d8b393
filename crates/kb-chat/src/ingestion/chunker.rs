//! Fixed-size text chunking
//!
//! Chunks are contiguous, non-overlapping slices of the input. Lengths are
//! counted in characters (Unicode scalar values), so a slice never ends
//! inside a multi-byte sequence.

/// Splits extracted text into index-sized segments
#[derive(Debug, Clone, Copy)]
pub struct TextChunker {
    /// Maximum chunk length in characters
    max_chars: usize,
}

impl TextChunker {
    /// Create a new chunker; a zero limit is raised to one character
    pub fn new(max_chars: usize) -> Self {
        Self {
            max_chars: max_chars.max(1),
        }
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    /// Split `text` into ordered chunks of at most `max_chars` characters
    pub fn chunk<'a>(&self, text: &'a str) -> Vec<&'a str> {
        chunk_text(text, self.max_chars)
    }
}

impl Default for TextChunker {
    fn default() -> Self {
        Self::new(1000)
    }
}

/// Split `text` into chunks of at most `max_chars` characters.
///
/// Concatenating the result in order yields `text` exactly; empty input
/// yields no chunks.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<&str> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::with_capacity(text.len() / max_chars + 1);
    let mut start = 0;
    let mut count = 0;

    for (offset, _) in text.char_indices() {
        if count == max_chars {
            chunks.push(&text[start..offset]);
            start = offset;
            count = 0;
        }
        count += 1;
    }

    if start < text.len() {
        chunks.push(&text[start..]);
    }

    chunks
}
