//! Query and document normalization shared by the lexical index.

use std::collections::HashSet;
use std::path::Path;

/// Built-in English stopword list, used when no stopword file is configured.
const DEFAULT_STOPWORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any", "are",
    "as", "at", "be", "because", "been", "before", "being", "below", "between", "both", "but",
    "by", "can", "cannot", "could", "did", "do", "does", "doing", "down", "during", "each", "few",
    "for", "from", "further", "had", "has", "have", "having", "he", "her", "here", "hers",
    "herself", "him", "himself", "his", "how", "i", "if", "in", "into", "is", "it", "its",
    "itself", "me", "more", "most", "my", "myself", "no", "nor", "not", "of", "off", "on", "once",
    "only", "or", "other", "ought", "our", "ours", "ourselves", "out", "over", "own", "same",
    "she", "should", "so", "some", "such", "than", "that", "the", "their", "theirs", "them",
    "themselves", "then", "there", "these", "they", "this", "those", "through", "to", "too",
    "under", "until", "up", "very", "was", "we", "were", "what", "when", "where", "which",
    "while", "who", "whom", "why", "with", "would", "you", "your", "yours", "yourself",
    "yourselves",
];

/// Lowercases, strips punctuation, splits on whitespace and drops stopwords.
/// No stemming is applied.
#[derive(Debug, Clone)]
pub struct TextPreprocessor {
    stopwords: HashSet<String>,
}

impl Default for TextPreprocessor {
    fn default() -> Self {
        Self {
            stopwords: DEFAULT_STOPWORDS.iter().map(|w| w.to_string()).collect(),
        }
    }
}

impl TextPreprocessor {
    pub fn with_stopwords<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            stopwords: words.into_iter().map(Into::into).collect(),
        }
    }

    /// Load a newline-separated stopword file. A missing or unreadable file
    /// falls back to the built-in list.
    pub fn from_stopword_file(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(data) => {
                let words: Vec<String> = data
                    .lines()
                    .map(|l| l.trim().to_lowercase())
                    .filter(|l| !l.is_empty())
                    .collect();
                tracing::info!("Loaded {} stopwords from {}", words.len(), path.display());
                Self::with_stopwords(words)
            }
            Err(e) => {
                tracing::warn!(
                    "Could not read stopwords from {}: {e}. Using built-in list",
                    path.display()
                );
                Self::default()
            }
        }
    }

    pub fn is_stopword(&self, token: &str) -> bool {
        self.stopwords.contains(token)
    }

    /// Normalize `text` into an ordered token sequence. Duplicates are kept.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let stripped: String = text
            .to_lowercase()
            .chars()
            .filter(|c| !c.is_ascii_punctuation())
            .collect();

        stripped
            .split_whitespace()
            .filter(|t| !self.is_stopword(t))
            .map(str::to_string)
            .collect()
    }
}
