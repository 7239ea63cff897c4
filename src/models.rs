use serde::{Deserialize, Serialize};

use crate::chunking::ChunkStrategy;

/// Number of description characters kept in search output.
pub const PREVIEW_CHARS: usize = 100;

/// A movie in the corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: u32,
    pub title: String,
    #[serde(default)]
    pub description: String,
}

impl Document {
    /// Copy of this document with the description cut to `max_chars` characters.
    pub fn preview(&self, max_chars: usize) -> Document {
        Document {
            id: self.id,
            title: self.title.clone(),
            description: truncate_chars(&self.description, max_chars).to_string(),
        }
    }

    /// Text the lexical index sees for this document.
    pub fn index_text(&self) -> String {
        format!("{} {}", self.title, self.description)
    }
}

/// Slice `text` to at most `max_chars` characters on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

/// A final search result, after fusion and optional re-ranking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: u32,
    pub title: String,
    /// Full description while the pipeline runs; the first
    /// [`PREVIEW_CHARS`] characters once results are returned.
    pub description: String,
    pub bm25_score: f32,
    pub semantic_score: f32,
    pub bm25_rank: Option<usize>,
    pub semantic_rank: Option<usize>,
    pub hybrid_score: f32,
    pub rerank_score: Option<f32>,
    /// 0-3 relevance label from the evaluation stage.
    pub llm_relevance: Option<u8>,
}

impl SearchHit {
    /// Text handed to generators and cross-encoders for this hit.
    pub fn display_text(&self) -> String {
        format!("{} - {}", self.title, self.description)
    }

    /// Cut the description to `max_chars` characters for output.
    pub fn into_preview(mut self, max_chars: usize) -> SearchHit {
        let end = truncate_chars(&self.description, max_chars).len();
        self.description.truncate(end);
        self
    }
}

/// Pre-fusion query enhancement strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnhanceMode {
    Spell,
    Rewrite,
    Expand,
}

/// Post-fusion re-ranking strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RerankMode {
    /// One 0-10 score per result.
    #[serde(alias = "individual")]
    Pointwise,
    /// A single ordering of all candidate ids.
    #[serde(alias = "batch")]
    Listwise,
    CrossEncoder,
}

/// Keyword search request
#[derive(Debug, Clone, Deserialize)]
pub struct KeywordSearchRequest {
    pub query: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

/// Weighted hybrid search request
#[derive(Debug, Clone, Deserialize)]
pub struct WeightedSearchRequest {
    pub query: String,
    #[serde(default = "default_alpha")]
    pub alpha: f32,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

/// RRF hybrid search request
#[derive(Debug, Clone, Deserialize)]
pub struct RrfSearchRequest {
    pub query: String,
    #[serde(default = "default_rrf_k")]
    pub k: f32,
    #[serde(default = "default_limit")]
    pub limit: usize,
    pub enhance: Option<EnhanceMode>,
    pub rerank: Option<RerankMode>,
    #[serde(default)]
    pub evaluate: bool,
}

pub fn default_limit() -> usize {
    5
}

fn default_alpha() -> f32 {
    0.5
}

pub fn default_rrf_k() -> f32 {
    60.0
}

/// Hybrid search response
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    /// Query as submitted.
    pub query: String,
    /// Query actually searched, after enhancement.
    pub effective_query: String,
    pub results: Vec<SearchHit>,
    pub total_bm25_hits: usize,
    pub total_semantic_hits: usize,
}

/// Document-level hit from a single retrieval channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredDocument {
    pub document: Document,
    pub score: f32,
}

/// Term introspection request (tf / idf / bm25 family).
#[derive(Debug, Clone, Deserialize)]
pub struct TermStatsRequest {
    pub term: String,
    pub doc_id: Option<u32>,
}

/// Every lexical statistic for one term, and one document when given.
#[derive(Debug, Clone, Serialize)]
pub struct TermStats {
    pub term: String,
    pub document_ids: Vec<u32>,
    pub idf: f32,
    pub bm25_idf: f32,
    pub doc_id: Option<u32>,
    pub term_frequency: Option<u32>,
    pub bm25_term_frequency: Option<f32>,
    pub tfidf: Option<f32>,
    pub bm25: Option<f32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NormalizeRequest {
    pub scores: Vec<f32>,
}

/// Ad-hoc chunking request. `size` counts words or sentences per strategy.
#[derive(Debug, Clone, Deserialize)]
pub struct ChunkRequest {
    pub text: String,
    #[serde(default)]
    pub strategy: ChunkStrategy,
    pub size: Option<usize>,
    #[serde(default)]
    pub overlap: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChunkResponse {
    pub strategy: ChunkStrategy,
    pub chunks: Vec<String>,
}

/// Retrieval-augmented answer style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerMode {
    #[default]
    Rag,
    Summarize,
    Citations,
    Question,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnswerRequest {
    pub query: String,
    #[serde(default)]
    pub mode: AnswerMode,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnswerResponse {
    pub query: String,
    pub mode: AnswerMode,
    pub sources: Vec<SearchHit>,
    pub answer: String,
}

/// One labelled query in the golden dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoldenCase {
    pub query: String,
    /// Titles of the documents that should be retrieved.
    pub relevant_docs: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EvaluateRequest {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

/// Chunked or whole-document semantic search request
#[derive(Debug, Clone, Deserialize)]
pub struct SemanticSearchRequest {
    pub query: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

/// Query-string parameters for image search
#[derive(Debug, Clone, Deserialize)]
pub struct ImageSearchParams {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub lexical_index: bool,
    pub vector_index: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildResponse {
    pub documents: usize,
    pub avg_doc_length: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct VectorIndexResponse {
    pub documents: usize,
    pub chunks: usize,
}
