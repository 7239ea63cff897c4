//! Text chunking: overlapping sentence windows for the vector index, and
//! fixed-size word windows.

use serde::{Deserialize, Serialize};

pub mod fixed;
pub mod sentence;

pub use fixed::chunk_words;
pub use sentence::{chunk_sentences, split_sentences};

/// Sentences per chunk used when building the chunk vector index.
pub const DEFAULT_WINDOW_SENTENCES: usize = 4;
/// Sentences shared between neighbouring chunks.
pub const DEFAULT_OVERLAP_SENTENCES: usize = 1;

/// Words per chunk for ad-hoc word chunking.
pub const DEFAULT_WORD_CHUNK_SIZE: usize = 200;

/// How ad-hoc text is split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkStrategy {
    /// `size` words per chunk, plus `overlap` preceding words.
    #[default]
    Words,
    /// `size` sentences per chunk, `overlap` shared with the previous one.
    Sentences,
}

impl ChunkStrategy {
    pub fn chunk(self, text: &str, size: Option<usize>, overlap: usize) -> Vec<String> {
        match self {
            ChunkStrategy::Words => {
                chunk_words(text, size.unwrap_or(DEFAULT_WORD_CHUNK_SIZE), overlap)
            }
            ChunkStrategy::Sentences => ChunkConfig {
                window: size.unwrap_or(DEFAULT_WINDOW_SENTENCES),
                overlap,
            }
            .chunk(text),
        }
    }
}

/// Sentence-window parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkConfig {
    pub window: usize,
    pub overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW_SENTENCES,
            overlap: DEFAULT_OVERLAP_SENTENCES,
        }
    }
}

impl ChunkConfig {
    /// Distance between the first sentences of neighbouring windows. Always at least 1.
    pub fn stride(&self) -> usize {
        let window = self.window.max(1);
        window - self.overlap.min(window - 1)
    }

    pub fn chunk(&self, text: &str) -> Vec<String> {
        chunk_sentences(text, self.window, self.overlap)
    }
}
