//! Splits raw text into ordered, trimmed, non-empty chunks.
//!
//! Chunking is a pure function of `(text, method, fixed_size)`.

use crate::types::ChunkingMethod;

pub const DEFAULT_FIXED_SIZE: usize = 500;

#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    fixed_size: usize,
}

impl Default for Chunker {
    fn default() -> Self { Self { fixed_size: DEFAULT_FIXED_SIZE } }
}

impl Chunker {
    /// `fixed_size` is the character budget of the `fixed` strategy.
    pub fn new(fixed_size: usize) -> Self { Self { fixed_size } }

    pub fn fixed_size(&self) -> usize { self.fixed_size }

    pub fn chunk(&self, text: &str, method: ChunkingMethod) -> Vec<String> {
        match method {
            ChunkingMethod::Sentence => split_trimmed(text, "."),
            ChunkingMethod::Paragraph => split_trimmed(text, "\n\n"),
            ChunkingMethod::Fixed => self.fixed(text),
        }
    }

    /// Greedy word packing. The overflow check runs before a word is
    /// appended, so a word longer than the budget still forms its own chunk.
    fn fixed(&self, text: &str) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut buffer = String::new();
        let mut buffer_chars = 0usize;
        for word in text.split_whitespace() {
            let word_chars = word.chars().count();
            if !buffer.is_empty() && buffer_chars + 1 + word_chars > self.fixed_size {
                chunks.push(std::mem::take(&mut buffer));
                buffer_chars = 0;
            }
            if !buffer.is_empty() {
                buffer.push(' ');
                buffer_chars += 1;
            }
            buffer.push_str(word);
            buffer_chars += word_chars;
        }
        if !buffer.is_empty() { chunks.push(buffer); }
        chunks
    }
}

fn split_trimmed(text: &str, delimiter: &str) -> Vec<String> {
    text.trim()
        .split(delimiter)
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .map(str::to_string)
        .collect()
}
