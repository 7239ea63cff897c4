//! Integration tests for the movie-search pipeline.
//!
//! These tests exercise indexing, caching, fusion and re-ranking end to end
//! with in-process collaborators instead of a running model server.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use movie_search::chunking::ChunkConfig;
use movie_search::config::Config;
use movie_search::evaluation;
use movie_search::llm::{CrossEncoder, Embedder, Generator};
use movie_search::models::{Document, EnhanceMode, GoldenCase, RerankMode};
use movie_search::search::bm25::{IndexPaths, InvertedIndex};
use movie_search::search::hybrid::HybridSearch;
use movie_search::search::vector::ChunkVectorStore;
use movie_search::state::AppState;
use movie_search::text::TextPreprocessor;
use movie_search::{Result, SearchError};

const VOCAB: &[&str] = &[
    "bear", "london", "shark", "ocean", "space", "robot", "toy", "dinosaur", "family", "island",
];

/// Bag-of-words embedder over a fixed vocabulary.
#[derive(Default)]
struct VocabEmbedder {
    batches: Mutex<usize>,
}

#[async_trait]
impl Embedder for VocabEmbedder {
    fn model_id(&self) -> String {
        "vocab-test".to_string()
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        *self.batches.lock() += 1;
        Ok(texts
            .iter()
            .map(|t| {
                let lower = t.to_lowercase();
                VOCAB.iter().map(|w| lower.matches(w).count() as f32).collect()
            })
            .collect())
    }
}

/// Replays canned responses in order; `Err` entries simulate outages.
struct ScriptedGenerator {
    responses: Mutex<VecDeque<std::result::Result<String, String>>>,
}

impl ScriptedGenerator {
    fn new(responses: &[std::result::Result<&str, &str>]) -> Self {
        Self {
            responses: Mutex::new(
                responses
                    .iter()
                    .map(|r| r.map(str::to_string).map_err(str::to_string))
                    .collect(),
            ),
        }
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn complete(&self, _prompt: &str) -> Result<String> {
        match self.responses.lock().pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(e)) => Err(SearchError::GenerationFailure(e)),
            None => Err(SearchError::GenerationFailure("no response scripted".to_string())),
        }
    }
}

/// Prefers documents mentioning "family".
struct FamilyCrossEncoder;

#[async_trait]
impl CrossEncoder for FamilyCrossEncoder {
    async fn score(&self, _query: &str, documents: &[String]) -> Result<Vec<f32>> {
        Ok(documents
            .iter()
            .map(|d| if d.to_lowercase().contains("family") { 1.0 } else { 0.0 })
            .collect())
    }
}

/// Prefers documents mentioning "marmalade" and records the length of
/// every text it was shown.
#[derive(Default)]
struct MarmaladeCrossEncoder {
    seen_lengths: Mutex<Vec<usize>>,
}

#[async_trait]
impl CrossEncoder for MarmaladeCrossEncoder {
    async fn score(&self, _query: &str, documents: &[String]) -> Result<Vec<f32>> {
        self.seen_lengths
            .lock()
            .extend(documents.iter().map(|d| d.chars().count()));
        Ok(documents
            .iter()
            .map(|d| if d.contains("marmalade") { 1.0 } else { 0.0 })
            .collect())
    }
}

/// Embedder that yields to the runtime before answering, so concurrent
/// callers interleave.
#[derive(Default)]
struct SlowEmbedder {
    inner: VocabEmbedder,
}

#[async_trait]
impl Embedder for SlowEmbedder {
    fn model_id(&self) -> String {
        self.inner.model_id()
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        self.inner.embed_batch(texts).await
    }
}

struct DownCrossEncoder;

#[async_trait]
impl CrossEncoder for DownCrossEncoder {
    async fn score(&self, _query: &str, _documents: &[String]) -> Result<Vec<f32>> {
        Err(SearchError::CrossEncoderFailure("connection refused".to_string()))
    }
}

fn doc(id: u32, title: &str, description: &str) -> Document {
    Document {
        id,
        title: title.to_string(),
        description: description.to_string(),
    }
}

fn movies() -> Vec<Document> {
    vec![
        doc(1, "Paddington", "A bear travels to London. He finds a family there."),
        doc(2, "Jaws", "A shark terrorises a beach town. The ocean is not safe."),
        doc(3, "The Revenant", "A frontiersman survives a bear attack."),
        doc(4, "Toy Story", "A toy cowboy feels replaced by a space ranger toy."),
        doc(5, "Jurassic Park", "A dinosaur theme park on an island goes wrong."),
        doc(6, "Grizzly Man", "A documentary about a man living among the bear population."),
    ]
}

async fn engine(dir: &std::path::Path) -> HybridSearch {
    let documents = movies();
    let index = InvertedIndex::build(TextPreprocessor::default(), &documents);
    let vectors = ChunkVectorStore::build(
        dir,
        documents,
        Arc::new(VocabEmbedder::default()),
        ChunkConfig::default(),
    )
    .await
    .unwrap();
    HybridSearch::new(Arc::new(index), Arc::new(vectors))
}

fn write_corpus(dir: &std::path::Path, documents: &[Document]) -> std::path::PathBuf {
    let path = dir.join("movies.json");
    let body = serde_json::json!({ "movies": documents });
    std::fs::write(&path, serde_json::to_vec(&body).unwrap()).unwrap();
    path
}

#[test]
fn test_lexical_index_round_trip_and_search() {
    let dir = tempfile::tempdir().unwrap();
    let paths = IndexPaths::new(dir.path());
    let index = InvertedIndex::build(TextPreprocessor::default(), &movies());
    index.save(&paths).unwrap();

    let loaded = InvertedIndex::load(&paths, TextPreprocessor::default()).unwrap();
    assert_eq!(loaded.postings(), index.postings());
    assert_eq!(loaded.term_counts(), index.term_counts());
    assert_eq!(loaded.doc_lengths(), index.doc_lengths());

    let hits = loaded.bm25_search("bear", 10);
    let ids: Vec<u32> = hits.iter().map(|h| h.document.id).collect();
    assert_eq!(ids.len(), 3);
    assert!(ids.contains(&1) && ids.contains(&3) && ids.contains(&6));
    assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
}

#[tokio::test]
async fn test_weighted_search_alpha_one_matches_bm25_order() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(dir.path()).await;

    let response = engine.weighted_search("bear london", 1.0, 3).await.unwrap();
    let bm25 = engine.index().bm25_search("bear london", 3);
    let fused: Vec<u32> = response.results.iter().map(|h| h.id).collect();
    let lexical: Vec<u32> = bm25.iter().map(|h| h.document.id).collect();
    assert_eq!(fused, lexical);
    assert_eq!(response.results[0].id, 1);
}

#[tokio::test]
async fn test_rrf_search_returns_exactly_limit() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(dir.path()).await;

    let response = engine
        .rrf_search("bear", 60.0, 2, None, None, false)
        .await
        .unwrap();
    assert_eq!(response.results.len(), 2);
    // The Revenant leads both channels for a single-term query.
    assert_eq!(response.results[0].title, "The Revenant");
    assert!(response.results[0].bm25_rank.is_some());
    assert!(response.results[0].semantic_rank.is_some());
    assert!(response.results.iter().all(|h| h.description.chars().count() <= 100));
}

#[tokio::test]
async fn test_rrf_search_uses_enhanced_query() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(dir.path())
        .await
        .with_generator(Arc::new(ScriptedGenerator::new(&[Ok("\"shark ocean\"")])));

    let response = engine
        .rrf_search("sharkk", 60.0, 1, Some(EnhanceMode::Spell), None, false)
        .await
        .unwrap();
    assert_eq!(response.effective_query, "shark ocean");
    assert_eq!(response.results[0].title, "Jaws");
}

#[tokio::test]
async fn test_failed_enhancement_falls_back_to_original_query() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(dir.path())
        .await
        .with_generator(Arc::new(ScriptedGenerator::new(&[Err("rate limited")])));

    let response = engine
        .rrf_search("dinosaur", 60.0, 1, Some(EnhanceMode::Rewrite), None, false)
        .await
        .unwrap();
    assert_eq!(response.effective_query, "dinosaur");
    assert_eq!(response.results[0].title, "Jurassic Park");
}

#[tokio::test]
async fn test_pointwise_failure_keeps_fused_order() {
    let dir = tempfile::tempdir().unwrap();
    let plain = engine(dir.path()).await;
    let baseline = plain
        .rrf_search("bear", 60.0, 3, None, None, false)
        .await
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let flaky = engine(dir.path())
        .await
        .with_generator(Arc::new(ScriptedGenerator::new(&[Ok("8"), Err("timeout")])));
    let response = flaky
        .rrf_search("bear", 60.0, 3, None, Some(RerankMode::Pointwise), false)
        .await
        .unwrap();

    let expected: Vec<u32> = baseline.results.iter().map(|h| h.id).collect();
    let actual: Vec<u32> = response.results.iter().map(|h| h.id).collect();
    assert_eq!(actual, expected);
}

#[tokio::test]
async fn test_cross_encoder_reorders_pool_before_truncation() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(dir.path())
        .await
        .with_cross_encoder(Arc::new(FamilyCrossEncoder));

    let response = engine
        .rrf_search("bear", 60.0, 1, None, Some(RerankMode::CrossEncoder), false)
        .await
        .unwrap();
    assert_eq!(response.results.len(), 1);
    assert_eq!(response.results[0].title, "Paddington");
    assert_eq!(response.results[0].rerank_score, Some(1.0));
}

#[tokio::test]
async fn test_cross_encoder_failure_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(dir.path())
        .await
        .with_cross_encoder(Arc::new(DownCrossEncoder));

    let err = engine
        .rrf_search("bear", 60.0, 3, None, Some(RerankMode::CrossEncoder), false)
        .await
        .unwrap_err();
    assert!(matches!(err, SearchError::CrossEncoderFailure(_)));
}

#[tokio::test]
async fn test_evaluation_labels_attached_without_reordering() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(dir.path())
        .await
        .with_generator(Arc::new(ScriptedGenerator::new(&[Ok("[3, 1]")])));

    let response = engine
        .rrf_search("bear", 60.0, 2, None, None, true)
        .await
        .unwrap();
    assert_eq!(response.results[0].llm_relevance, Some(3));
    assert_eq!(response.results[1].llm_relevance, Some(1));
}

#[tokio::test]
async fn test_golden_evaluation() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(dir.path()).await;
    let cases = vec![GoldenCase {
        query: "dinosaur island".to_string(),
        relevant_docs: vec!["Jurassic Park".to_string()],
    }];

    let report = evaluation::evaluate(&engine, &cases, 1).await.unwrap();
    assert_eq!(report.cases[0].precision, 1.0);
    assert_eq!(report.cases[0].recall, 1.0);
    assert_eq!(report.mean_f1, 1.0);
}

#[tokio::test]
async fn test_app_state_requires_explicit_lexical_build() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        movies_path: Some(write_corpus(dir.path(), &movies())),
        cache_dir: dir.path().join("cache"),
        ..Config::default()
    };
    let embedder = Arc::new(VocabEmbedder::default());
    let state = AppState::with_collaborators(
        config,
        embedder.clone(),
        Arc::new(ScriptedGenerator::new(&[])),
        None,
    );

    assert!(matches!(
        state.lexical_index().unwrap_err(),
        SearchError::IndexNotFound(_)
    ));

    state.build_lexical_index().unwrap();
    let engine = state.engine().await.unwrap();
    let response = engine
        .rrf_search("toy", 60.0, 1, None, None, false)
        .await
        .unwrap();
    assert_eq!(response.results[0].title, "Toy Story");
    assert_eq!(*embedder.batches.lock(), 2); // chunk build + query
}

#[tokio::test]
async fn test_vector_cache_rebuilt_when_description_length_changes() {
    let dir = tempfile::tempdir().unwrap();
    let embedder = Arc::new(VocabEmbedder::default());

    ChunkVectorStore::load_or_build(dir.path(), movies(), embedder.clone(), ChunkConfig::default())
        .await
        .unwrap();
    ChunkVectorStore::load_or_build(dir.path(), movies(), embedder.clone(), ChunkConfig::default())
        .await
        .unwrap();
    assert_eq!(*embedder.batches.lock(), 1);

    let mut edited = movies();
    edited[1].description.push_str(" Sequel.");
    ChunkVectorStore::load_or_build(dir.path(), edited, embedder.clone(), ChunkConfig::default())
        .await
        .unwrap();
    assert_eq!(*embedder.batches.lock(), 2);
}

#[tokio::test]
async fn test_rerank_sees_text_past_preview_length() {
    let dir = tempfile::tempdir().unwrap();
    let long = format!("A bear. {} He loves marmalade.", "x".repeat(120));
    let documents = vec![
        doc(1, "Paddington", &long),
        doc(3, "The Revenant", "A frontiersman survives a bear attack."),
    ];
    let index = InvertedIndex::build(TextPreprocessor::default(), &documents);
    let vectors = ChunkVectorStore::build(
        dir.path(),
        documents,
        Arc::new(VocabEmbedder::default()),
        ChunkConfig::default(),
    )
    .await
    .unwrap();
    let encoder = Arc::new(MarmaladeCrossEncoder::default());
    let engine = HybridSearch::new(Arc::new(index), Arc::new(vectors))
        .with_cross_encoder(encoder.clone());

    let response = engine
        .rrf_search("bear", 60.0, 1, None, Some(RerankMode::CrossEncoder), false)
        .await
        .unwrap();

    assert_eq!(response.results[0].title, "Paddington");
    assert_eq!(response.results[0].description.chars().count(), 100);
    assert!(encoder.seen_lengths.lock().iter().any(|len| *len > 100));
}

#[tokio::test]
async fn test_concurrent_first_requests_build_vectors_once() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        movies_path: Some(write_corpus(dir.path(), &movies())),
        cache_dir: dir.path().join("cache"),
        ..Config::default()
    };
    let embedder = Arc::new(SlowEmbedder::default());
    let state = AppState::with_collaborators(
        config,
        embedder.clone(),
        Arc::new(ScriptedGenerator::new(&[])),
        None,
    );

    let (a, b) = tokio::join!(state.vector_index(), state.vector_index());
    let (a, b) = (a.unwrap(), b.unwrap());
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(*embedder.inner.batches.lock(), 1);

    let (c, d) = tokio::join!(state.document_vectors(), state.document_vectors());
    assert!(Arc::ptr_eq(&c.unwrap(), &d.unwrap()));
    assert_eq!(*embedder.inner.batches.lock(), 2);
}
