use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Result, SearchError};
use crate::llm::enhance::enhance_query;
use crate::llm::rerank::{self, Rerankers};
use crate::llm::{CrossEncoder, Generator};
use crate::models::{
    Document, EnhanceMode, RerankMode, ScoredDocument, SearchHit, SearchResponse, PREVIEW_CHARS,
};
use crate::search::bm25::InvertedIndex;
use crate::search::vector::ChunkVectorStore;

/// Candidates pulled from each channel per requested result.
pub const CANDIDATE_MULTIPLIER: usize = 500;
/// RRF results handed to the re-ranker per requested result.
pub const RERANK_POOL_FACTOR: usize = 5;
pub const DEFAULT_RRF_K: f32 = 60.0;

/// Per-document fusion state, created the first time either channel yields
/// the document.
#[derive(Debug, Clone)]
pub struct ScoreRecord {
    pub document: Document,
    pub bm25_score: f32,
    pub semantic_score: f32,
    pub bm25_rank: Option<usize>,
    pub semantic_rank: Option<usize>,
    pub hybrid_score: f32,
}

impl ScoreRecord {
    fn new(document: &Document) -> Self {
        Self {
            document: document.clone(),
            bm25_score: 0.0,
            semantic_score: 0.0,
            bm25_rank: None,
            semantic_rank: None,
            hybrid_score: 0.0,
        }
    }

    /// Hit carrying the full description.
    pub fn into_hit(self) -> SearchHit {
        SearchHit {
            id: self.document.id,
            title: self.document.title,
            description: self.document.description,
            bm25_score: self.bm25_score,
            semantic_score: self.semantic_score,
            bm25_rank: self.bm25_rank,
            semantic_rank: self.semantic_rank,
            hybrid_score: self.hybrid_score,
            rerank_score: None,
            llm_relevance: None,
        }
    }
}

/// Insertion-ordered map of score records keyed by document id.
#[derive(Default)]
struct ScoreMap {
    positions: HashMap<u32, usize>,
    records: Vec<ScoreRecord>,
}

impl ScoreMap {
    fn entry(&mut self, document: &Document) -> &mut ScoreRecord {
        let records = &mut self.records;
        let pos = *self.positions.entry(document.id).or_insert_with(|| {
            records.push(ScoreRecord::new(document));
            records.len() - 1
        });
        &mut self.records[pos]
    }

    /// Sort by hybrid score descending (stable) and keep the top `limit`.
    fn into_hits(mut self, limit: usize) -> Vec<SearchHit> {
        self.records.sort_by(|a, b| {
            b.hybrid_score
                .partial_cmp(&a.hybrid_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        self.records.truncate(limit);
        self.records.into_iter().map(ScoreRecord::into_hit).collect()
    }
}

/// Min-max normalize to [0, 1]. All-equal input is returned unchanged.
pub fn normalize(scores: &[f32]) -> Vec<f32> {
    let Some(&first) = scores.first() else {
        return Vec::new();
    };
    let (min, max) = scores
        .iter()
        .fold((first, first), |(lo, hi), &s| (lo.min(s), hi.max(s)));
    if max == min {
        return scores.to_vec();
    }
    let range = max - min;
    scores.iter().map(|s| (s - min) / range).collect()
}

pub fn hybrid_score(bm25: f32, semantic: f32, alpha: f32) -> f32 {
    alpha * bm25 + (1.0 - alpha) * semantic
}

/// Reciprocal rank contribution for a 1-based `rank`.
pub fn rrf_score(rank: usize, k: f32) -> f32 {
    1.0 / (k + rank as f32)
}

/// Weighted min-max fusion. Hits report the normalized channel scores and
/// preview descriptions; a document absent from a channel scores 0 there.
pub fn weighted_fusion(
    bm25: &[ScoredDocument],
    semantic: &[ScoredDocument],
    alpha: f32,
    limit: usize,
) -> Vec<SearchHit> {
    let bm25_norm = normalize(&bm25.iter().map(|r| r.score).collect::<Vec<_>>());
    let semantic_norm = normalize(&semantic.iter().map(|r| r.score).collect::<Vec<_>>());

    let mut map = ScoreMap::default();
    for (r, norm) in bm25.iter().zip(bm25_norm) {
        map.entry(&r.document).bm25_score = norm;
    }
    for (r, norm) in semantic.iter().zip(semantic_norm) {
        map.entry(&r.document).semantic_score = norm;
    }

    for record in &mut map.records {
        record.hybrid_score = hybrid_score(record.bm25_score, record.semantic_score, alpha);
    }
    map.into_hits(limit)
        .into_iter()
        .map(|hit| hit.into_preview(PREVIEW_CHARS))
        .collect()
}

/// Reciprocal rank fusion. Each channel is ranked 1..M by descending raw
/// score, keeping the channel's own order on ties. Descriptions are left
/// whole so re-ranking sees the full text.
pub fn rrf_fusion(
    bm25: &[ScoredDocument],
    semantic: &[ScoredDocument],
    k: f32,
    limit: usize,
) -> Vec<SearchHit> {
    let mut map = ScoreMap::default();

    for (rank, r) in ranked(bm25).into_iter().enumerate() {
        let record = map.entry(&r.document);
        record.bm25_score = r.score;
        record.bm25_rank = Some(rank + 1);
    }
    for (rank, r) in ranked(semantic).into_iter().enumerate() {
        let record = map.entry(&r.document);
        record.semantic_score = r.score;
        record.semantic_rank = Some(rank + 1);
    }

    for record in &mut map.records {
        record.hybrid_score = record.bm25_rank.map_or(0.0, |r| rrf_score(r, k))
            + record.semantic_rank.map_or(0.0, |r| rrf_score(r, k));
    }
    map.into_hits(limit)
}

fn ranked(results: &[ScoredDocument]) -> Vec<&ScoredDocument> {
    let mut sorted: Vec<&ScoredDocument> = results.iter().collect();
    sorted.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    sorted
}

/// Hybrid retrieval over a lexical index and a chunk vector store, with
/// optional generator-driven enhancement and re-ranking.
pub struct HybridSearch {
    index: Arc<InvertedIndex>,
    vectors: Arc<ChunkVectorStore>,
    generator: Option<Arc<dyn Generator>>,
    cross_encoder: Option<Arc<dyn CrossEncoder>>,
}

impl HybridSearch {
    pub fn new(index: Arc<InvertedIndex>, vectors: Arc<ChunkVectorStore>) -> Self {
        Self {
            index,
            vectors,
            generator: None,
            cross_encoder: None,
        }
    }

    pub fn with_generator(mut self, generator: Arc<dyn Generator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn with_cross_encoder(mut self, cross_encoder: Arc<dyn CrossEncoder>) -> Self {
        self.cross_encoder = Some(cross_encoder);
        self
    }

    async fn candidates(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<(Vec<ScoredDocument>, Vec<ScoredDocument>)> {
        let n = limit.saturating_mul(CANDIDATE_MULTIPLIER);
        let bm25 = self.index.bm25_search(query, n);
        let semantic = self.vectors.search_full_text(query, n).await?;
        tracing::debug!(
            "Candidates for '{query}': {} bm25, {} semantic",
            bm25.len(),
            semantic.len()
        );
        Ok((bm25, semantic))
    }

    pub async fn weighted_search(
        &self,
        query: &str,
        alpha: f32,
        limit: usize,
    ) -> Result<SearchResponse> {
        validate_query(query)?;
        if !(0.0..=1.0).contains(&alpha) {
            return Err(SearchError::InvalidQuery(format!(
                "alpha must be within [0, 1], got {alpha}"
            )));
        }

        let (bm25, semantic) = self.candidates(query, limit).await?;
        let results = weighted_fusion(&bm25, &semantic, alpha, limit);

        Ok(SearchResponse {
            query: query.to_string(),
            effective_query: query.to_string(),
            results,
            total_bm25_hits: bm25.len(),
            total_semantic_hits: semantic.len(),
        })
    }

    /// RRF pipeline: enhance, fuse, re-rank a `limit * 5` pool, truncate to
    /// `limit`, optionally label the survivors, then cut descriptions to the
    /// preview length.
    pub async fn rrf_search(
        &self,
        query: &str,
        k: f32,
        limit: usize,
        enhance: Option<EnhanceMode>,
        rerank_mode: Option<RerankMode>,
        evaluate: bool,
    ) -> Result<SearchResponse> {
        validate_query(query)?;
        if k.is_nan() || k < 0.0 {
            return Err(SearchError::InvalidQuery(format!("k must be non-negative, got {k}")));
        }

        let effective_query = match enhance {
            Some(mode) => self.enhance(mode, query).await,
            None => query.to_string(),
        };

        let (bm25, semantic) = self.candidates(&effective_query, limit).await?;
        let mut results = rrf_fusion(
            &bm25,
            &semantic,
            k,
            limit.saturating_mul(RERANK_POOL_FACTOR),
        );

        if let Some(mode) = rerank_mode {
            let rerankers = Rerankers {
                generator: self.generator.as_deref(),
                cross_encoder: self.cross_encoder.as_deref(),
            };
            results = rerank::rerank(mode, rerankers, &effective_query, results).await?;
        }
        results.truncate(limit);

        if evaluate {
            self.evaluate(&effective_query, &mut results).await;
        }
        let results: Vec<SearchHit> = results
            .into_iter()
            .map(|hit| hit.into_preview(PREVIEW_CHARS))
            .collect();

        Ok(SearchResponse {
            query: query.to_string(),
            effective_query,
            results,
            total_bm25_hits: bm25.len(),
            total_semantic_hits: semantic.len(),
        })
    }

    /// Enhanced query, or the original one if enhancement is unavailable or fails.
    async fn enhance(&self, mode: EnhanceMode, query: &str) -> String {
        let Some(generator) = self.generator.as_deref() else {
            tracing::warn!("{mode:?} enhancement requested without a generator");
            return query.to_string();
        };
        match enhance_query(generator, mode, query).await {
            Ok(enhanced) => enhanced,
            Err(e) => {
                tracing::warn!("{mode:?} enhancement failed, using original query: {e}");
                query.to_string()
            }
        }
    }

    async fn evaluate(&self, query: &str, hits: &mut [SearchHit]) {
        let Some(generator) = self.generator.as_deref() else {
            tracing::warn!("Evaluation requested without a generator");
            return;
        };
        if let Err(e) = rerank::evaluate(generator, query, hits).await {
            tracing::warn!("Relevance evaluation failed: {e}");
        }
    }

    pub fn index(&self) -> &InvertedIndex {
        &self.index
    }
}

fn validate_query(query: &str) -> Result<()> {
    if query.trim().is_empty() {
        return Err(SearchError::InvalidQuery("query is empty".to_string()));
    }
    Ok(())
}
