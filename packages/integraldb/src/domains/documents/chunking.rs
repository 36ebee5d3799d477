//! Fixed-size overlapping windows over document text.
//!
//! Sizes and offsets count characters (Unicode scalar values), never bytes,
//! so a window boundary can't split a code point. With size `S` and overlap
//! `O`, window `i` starts at `i * (S - O)`; the last window is cut short at
//! the end of the text and generation stops there.
//!
//! ```text
//! "ABCDEFGHIJ", S=4, O=1  ->  ABCD | DEFG | GHIJ
//! ```

use crate::common::{PipelineError, Result};

/// Validated window size and overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    size: usize,
    overlap: usize,
}

impl ChunkingConfig {
    /// Fails unless `0 <= overlap < size`.
    pub fn new(size: usize, overlap: usize) -> Result<Self> {
        if size == 0 {
            return Err(PipelineError::Config("chunk size must be positive".into()));
        }
        if overlap >= size {
            return Err(PipelineError::Config(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                overlap, size
            )));
        }
        Ok(Self { size, overlap })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Distance between the starts of consecutive windows.
    pub fn stride(&self) -> usize {
        self.size - self.overlap
    }
}

/// One window of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    pub index: usize,
    /// Character offset of the first character, inclusive
    pub char_start: usize,
    /// Character offset past the last character
    pub char_end: usize,
    /// Characters shared with the previous window (0 for the first)
    pub overlap: usize,
    pub text: String,
}

impl TextChunk {
    pub fn char_len(&self) -> usize {
        self.char_end - self.char_start
    }

    /// The part of this window not already covered by the previous one.
    pub fn fresh_text(&self) -> &str {
        match self.text.char_indices().nth(self.overlap) {
            Some((byte, _)) => &self.text[byte..],
            None => "",
        }
    }
}

/// Split `text` into overlapping windows.
///
/// Empty text yields no windows; text of at most `size` characters yields one.
pub fn chunk_text(text: &str, config: &ChunkingConfig) -> Vec<TextChunk> {
    // Byte offset of every character, plus the end of the string.
    let bounds: Vec<usize> = text
        .char_indices()
        .map(|(byte, _)| byte)
        .chain(std::iter::once(text.len()))
        .collect();
    let total = bounds.len() - 1;

    let mut chunks = Vec::with_capacity(total / config.stride() + 1);
    if total == 0 {
        return chunks;
    }

    let mut start = 0;
    loop {
        let end = (start + config.size).min(total);
        let overlap = if chunks.is_empty() { 0 } else { config.overlap };
        chunks.push(TextChunk {
            index: chunks.len(),
            char_start: start,
            char_end: end,
            overlap,
            text: text[bounds[start]..bounds[end]].to_string(),
        });
        if end == total {
            break;
        }
        start += config.stride();
    }

    chunks
}

/// Rebuild the original text from its windows by dropping each window's
/// overlap with its predecessor.
pub fn reassemble(chunks: &[TextChunk]) -> String {
    let mut out = String::new();
    for chunk in chunks {
        out.push_str(chunk.fresh_text());
    }
    out
}
