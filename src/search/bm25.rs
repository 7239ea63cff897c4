use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use crate::error::{Result, SearchError};
use crate::models::{Document, ScoredDocument};
use crate::persist;
use crate::text::TextPreprocessor;

/// BM25 term-frequency saturation.
pub const BM25_K1: f32 = 1.5;
/// BM25 document-length normalization strength.
pub const BM25_B: f32 = 0.75;

/// File layout of a persisted lexical index.
#[derive(Debug, Clone)]
pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn postings(&self) -> PathBuf {
        self.root.join("index.bin")
    }

    pub fn docmap(&self) -> PathBuf {
        self.root.join("docmap.bin")
    }

    pub fn term_frequencies(&self) -> PathBuf {
        self.root.join("term_frequencies.bin")
    }

    pub fn doc_lengths(&self) -> PathBuf {
        self.root.join("doc_lengths.bin")
    }

    fn all(&self) -> [PathBuf; 4] {
        [
            self.postings(),
            self.docmap(),
            self.term_frequencies(),
            self.doc_lengths(),
        ]
    }

    /// True only when every artifact is present.
    pub fn exists(&self) -> bool {
        self.all().iter().all(|p| p.is_file())
    }
}

/// In-memory inverted index with TF-IDF and BM25 scoring.
///
/// Invariants: every id in `postings` is a key of `docmap`; the counts in
/// `term_frequencies[id]` sum to `doc_lengths[id]`.
#[derive(Debug, Clone, Default)]
pub struct InvertedIndex {
    preprocessor: TextPreprocessor,
    postings: HashMap<String, BTreeSet<u32>>,
    docmap: HashMap<u32, Document>,
    term_frequencies: HashMap<u32, HashMap<String, u32>>,
    doc_lengths: HashMap<u32, usize>,
}

impl InvertedIndex {
    pub fn new(preprocessor: TextPreprocessor) -> Self {
        Self {
            preprocessor,
            ..Self::default()
        }
    }

    /// Index every document's `"{title} {description}"`.
    pub fn build(preprocessor: TextPreprocessor, documents: &[Document]) -> Self {
        let mut index = Self::new(preprocessor);
        for doc in documents {
            index.add_document(doc);
        }
        tracing::info!(
            "Built lexical index: {} documents, {} terms",
            index.docmap.len(),
            index.postings.len()
        );
        index
    }

    fn add_document(&mut self, doc: &Document) {
        let tokens = self.preprocessor.tokenize(&doc.index_text());
        let counts = self.term_frequencies.entry(doc.id).or_default();
        counts.clear();

        for token in &tokens {
            self.postings
                .entry(token.clone())
                .or_default()
                .insert(doc.id);
            *counts.entry(token.clone()).or_insert(0) += 1;
        }

        self.doc_lengths.insert(doc.id, tokens.len());
        self.docmap.insert(doc.id, doc.clone());
    }

    /// Persist all four artifacts under `paths.root`.
    pub fn save(&self, paths: &IndexPaths) -> Result<()> {
        persist::save_bincode(&paths.postings(), &self.postings)?;
        persist::save_bincode(&paths.docmap(), &self.docmap)?;
        persist::save_bincode(&paths.term_frequencies(), &self.term_frequencies)?;
        persist::save_bincode(&paths.doc_lengths(), &self.doc_lengths)?;
        tracing::info!("Saved lexical index to {}", paths.root.display());
        Ok(())
    }

    /// Load a previously saved index. Never rebuilds: any missing artifact
    /// fails with `IndexNotFound`.
    pub fn load(paths: &IndexPaths, preprocessor: TextPreprocessor) -> Result<Self> {
        for path in paths.all() {
            if !path.is_file() {
                return Err(SearchError::IndexNotFound(path));
            }
        }

        let index = Self {
            preprocessor,
            postings: persist::load_bincode(&paths.postings())?,
            docmap: persist::load_bincode(&paths.docmap())?,
            term_frequencies: persist::load_bincode(&paths.term_frequencies())?,
            doc_lengths: persist::load_bincode(&paths.doc_lengths())?,
        };
        tracing::debug!(
            "Loaded lexical index: {} documents from {}",
            index.docmap.len(),
            paths.root.display()
        );
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.docmap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docmap.is_empty()
    }

    pub fn document(&self, doc_id: u32) -> Option<&Document> {
        self.docmap.get(&doc_id)
    }

    pub fn preprocessor(&self) -> &TextPreprocessor {
        &self.preprocessor
    }

    pub fn postings(&self) -> &HashMap<String, BTreeSet<u32>> {
        &self.postings
    }

    pub fn term_counts(&self) -> &HashMap<u32, HashMap<String, u32>> {
        &self.term_frequencies
    }

    pub fn doc_lengths(&self) -> &HashMap<u32, usize> {
        &self.doc_lengths
    }

    pub fn avg_doc_length(&self) -> f32 {
        if self.doc_lengths.is_empty() {
            return 0.0;
        }
        let total: usize = self.doc_lengths.values().sum();
        total as f32 / self.doc_lengths.len() as f32
    }

    /// Normalize `term` and require exactly one resulting token.
    fn single_token(&self, term: &str) -> Result<String> {
        let mut tokens = self.preprocessor.tokenize(term);
        match tokens.len() {
            1 => Ok(tokens.remove(0)),
            0 => Err(SearchError::InvalidQuery(format!(
                "'{term}' contains no searchable token"
            ))),
            n => Err(SearchError::InvalidQuery(format!(
                "'{term}' must be a single token, got {n}"
            ))),
        }
    }

    fn document_frequency(&self, token: &str) -> usize {
        self.postings.get(token).map_or(0, BTreeSet::len)
    }

    fn raw_tf(&self, doc_id: u32, token: &str) -> u32 {
        self.term_frequencies
            .get(&doc_id)
            .and_then(|counts| counts.get(token))
            .copied()
            .unwrap_or(0)
    }

    /// Sorted ids of documents containing the normalized `term`.
    pub fn get_documents(&self, term: &str) -> Vec<u32> {
        match self.single_token(term) {
            Ok(token) => self
                .postings
                .get(&token)
                .map(|ids| ids.iter().copied().collect())
                .unwrap_or_default(),
            Err(_) => Vec::new(),
        }
    }

    /// Raw count of `term` in `doc_id` (0 for unknown documents).
    pub fn term_frequency(&self, doc_id: u32, term: &str) -> Result<u32> {
        let token = self.single_token(term)?;
        Ok(self.raw_tf(doc_id, &token))
    }

    /// Saturated, length-normalized term frequency.
    pub fn bm25_term_frequency(&self, doc_id: u32, term: &str, k1: f32, b: f32) -> Result<f32> {
        let token = self.single_token(term)?;
        Ok(self.bm25_tf_token(doc_id, &token, k1, b, self.avg_doc_length()))
    }

    fn bm25_tf_token(&self, doc_id: u32, token: &str, k1: f32, b: f32, avg_len: f32) -> f32 {
        let tf = self.raw_tf(doc_id, token) as f32;
        let doc_len = self.doc_lengths.get(&doc_id).copied().unwrap_or(0) as f32;
        let length_ratio = if avg_len > 0.0 { doc_len / avg_len } else { 0.0 };
        let denom = tf + k1 * (1.0 - b + b * length_ratio);
        if denom == 0.0 {
            0.0
        } else {
            tf * (k1 + 1.0) / denom
        }
    }

    /// Smoothed IDF, `ln((N+1)/(df+1))`. Never negative.
    pub fn idf(&self, term: &str) -> Result<f32> {
        let token = self.single_token(term)?;
        let n = self.docmap.len() as f32;
        let df = self.document_frequency(&token) as f32;
        Ok(((n + 1.0) / (df + 1.0)).ln())
    }

    /// Okapi IDF, `ln((N-df+0.5)/(df+0.5)+1)`.
    pub fn bm25_idf(&self, term: &str) -> Result<f32> {
        let token = self.single_token(term)?;
        Ok(self.bm25_idf_token(&token))
    }

    fn bm25_idf_token(&self, token: &str) -> f32 {
        let n = self.docmap.len() as f32;
        let df = self.document_frequency(token) as f32;
        ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
    }

    pub fn tfidf(&self, doc_id: u32, term: &str) -> Result<f32> {
        let tf = self.term_frequency(doc_id, term)? as f32;
        Ok(tf * self.idf(term)?)
    }

    pub fn bm25(&self, doc_id: u32, term: &str) -> Result<f32> {
        let token = self.single_token(term)?;
        let avg = self.avg_doc_length();
        Ok(self.bm25_tf_token(doc_id, &token, BM25_K1, BM25_B, avg) * self.bm25_idf_token(&token))
    }

    /// Presence-only search: walks query tokens in order and collects the
    /// documents in each token's postings until `limit` distinct ids are seen.
    pub fn search(&self, query: &str, limit: usize) -> Vec<Document> {
        let mut seen = BTreeSet::new();
        let mut results = Vec::new();

        'tokens: for token in self.preprocessor.tokenize(query) {
            let Some(ids) = self.postings.get(&token) else {
                continue;
            };
            for id in ids {
                if results.len() >= limit {
                    break 'tokens;
                }
                if seen.insert(*id) {
                    if let Some(doc) = self.docmap.get(id) {
                        results.push(doc.clone());
                    }
                }
            }
        }

        results
    }

    /// Rank documents by the sum of `bm25(doc, token)` over query tokens.
    /// Equal scores keep the order in which documents were first encountered.
    pub fn bm25_search(&self, query: &str, limit: usize) -> Vec<ScoredDocument> {
        let tokens = self.preprocessor.tokenize(query);
        let avg = self.avg_doc_length();

        let mut order: Vec<u32> = Vec::new();
        let mut scores: HashMap<u32, f32> = HashMap::new();

        for token in &tokens {
            let Some(ids) = self.postings.get(token) else {
                continue;
            };
            let idf = self.bm25_idf_token(token);
            for id in ids {
                let contribution = self.bm25_tf_token(*id, token, BM25_K1, BM25_B, avg) * idf;
                match scores.get_mut(id) {
                    Some(score) => *score += contribution,
                    None => {
                        order.push(*id);
                        scores.insert(*id, contribution);
                    }
                }
            }
        }

        let mut ranked: Vec<(u32, f32)> = order
            .into_iter()
            .map(|id| (id, scores[&id]))
            .collect();
        // Stable sort preserves first-encounter order on ties
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(limit);

        ranked
            .into_iter()
            .filter_map(|(id, score)| {
                self.docmap.get(&id).map(|doc| ScoredDocument {
                    document: doc.clone(),
                    score,
                })
            })
            .collect()
    }
}
