//! Fixed-size word chunker.

/// Windows start every `size` words and also carry the `overlap` words
/// preceding their start.
pub fn chunk_words(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    let size = size.max(1);

    let mut chunks = Vec::new();
    let mut current = 0usize;
    while current < words.len() {
        let start = current.saturating_sub(overlap);
        let end = (current + size).min(words.len());
        chunks.push(words[start..end].join(" "));
        current += size;
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_words_no_overlap() {
        let chunks = chunk_words("a b c d e", 2, 0);
        assert_eq!(chunks, vec!["a b", "c d", "e"]);
    }

    #[test]
    fn test_chunk_words_with_overlap() {
        let chunks = chunk_words("a b c d e f", 3, 1);
        assert_eq!(chunks, vec!["a b c", "c d e f"]);
    }

    #[test]
    fn test_chunk_words_empty() {
        assert!(chunk_words("", 5, 1).is_empty());
    }
}
