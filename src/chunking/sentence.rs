//! Sentence-window chunker.
//!
//! Sentences end at `.`, `!` or `?` followed by whitespace. Windows hold
//! `window` sentences and advance by `window - overlap`; the final partial
//! window is kept.

use regex::Regex;
use std::sync::OnceLock;

use super::ChunkConfig;

fn boundary() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[.!?]\s+").expect("valid sentence boundary regex"))
}

/// Split `text` into trimmed, non-empty sentences, keeping end punctuation.
pub fn split_sentences(text: &str) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }

    let mut sentences = Vec::new();
    let mut start = 0usize;
    for m in boundary().find_iter(text) {
        // Punctuation is a single ASCII byte
        let end = m.start() + 1;
        sentences.push(&text[start..end]);
        start = m.end();
    }
    sentences.push(&text[start..]);

    sentences
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Group sentences into overlapping windows.
pub fn chunk_sentences(text: &str, window: usize, overlap: usize) -> Vec<String> {
    let sentences = split_sentences(text);
    if sentences.is_empty() {
        return Vec::new();
    }

    let window = window.max(1);
    let overlap = overlap.min(window - 1);
    let stride = ChunkConfig { window, overlap }.stride();

    let mut chunks = vec![sentences[..window.min(sentences.len())].join(" ")];
    let mut next = window;
    while next < sentences.len() {
        let start = next - overlap;
        let end = (start + window).min(sentences.len());
        chunks.push(sentences[start..end].join(" "));
        next += stride;
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_sentences() {
        let s = split_sentences("A bear. In London!  Eats marmalade? Yes");
        assert_eq!(s, vec!["A bear.", "In London!", "Eats marmalade?", "Yes"]);
    }

    #[test]
    fn test_split_keeps_abbreviation_without_space() {
        let s = split_sentences("Version 2.0 released. Done.");
        assert_eq!(s, vec!["Version 2.0 released.", "Done."]);
    }

    #[test]
    fn test_split_empty() {
        assert!(split_sentences("").is_empty());
        assert!(split_sentences("   ").is_empty());
    }

    #[test]
    fn test_single_window_when_short() {
        let chunks = chunk_sentences("One. Two. Three.", 4, 1);
        assert_eq!(chunks, vec!["One. Two. Three."]);
    }

    #[test]
    fn test_overlapping_windows() {
        let text = "S1. S2. S3. S4. S5. S6. S7. S8.";
        let chunks = chunk_sentences(text, 4, 1);
        assert_eq!(
            chunks,
            vec!["S1. S2. S3. S4.", "S4. S5. S6. S7.", "S7. S8."]
        );
    }

    #[test]
    fn test_no_overlap() {
        let chunks = chunk_sentences("A. B. C. D. E.", 2, 0);
        assert_eq!(chunks, vec!["A. B.", "C. D.", "E."]);
    }

    #[test]
    fn test_overlap_not_smaller_than_window_still_advances() {
        let chunks = chunk_sentences("A. B. C.", 2, 2);
        assert_eq!(chunks, vec!["A. B.", "B. C."]);
    }
}
