use axum::extract::State;
use axum::Json;

use super::{error_response, ApiError};
use crate::models::{
    ChunkRequest, ChunkResponse, Document, KeywordSearchRequest, NormalizeRequest,
    ScoredDocument, TermStats, TermStatsRequest,
};
use crate::search::bm25::{BM25_B, BM25_K1};
use crate::search::hybrid::normalize;
use crate::state::AppState;

/// POST /api/keyword/search - Presence-only postings scan
pub async fn keyword_search(
    State(state): State<AppState>,
    Json(req): Json<KeywordSearchRequest>,
) -> Result<Json<Vec<Document>>, ApiError> {
    let index = state.lexical_index().map_err(error_response)?;
    Ok(Json(index.search(&req.query, req.limit)))
}

/// POST /api/keyword/bm25 - BM25-ranked keyword search
pub async fn bm25_search(
    State(state): State<AppState>,
    Json(req): Json<KeywordSearchRequest>,
) -> Result<Json<Vec<ScoredDocument>>, ApiError> {
    let index = state.lexical_index().map_err(error_response)?;
    Ok(Json(index.bm25_search(&req.query, req.limit)))
}

/// POST /api/keyword/stats - Every lexical statistic for a single term
pub async fn term_stats(
    State(state): State<AppState>,
    Json(req): Json<TermStatsRequest>,
) -> Result<Json<TermStats>, ApiError> {
    let index = state.lexical_index().map_err(error_response)?;
    let term = req.term.as_str();

    let mut stats = TermStats {
        term: req.term.clone(),
        document_ids: index.get_documents(term),
        idf: index.idf(term).map_err(error_response)?,
        bm25_idf: index.bm25_idf(term).map_err(error_response)?,
        doc_id: req.doc_id,
        term_frequency: None,
        bm25_term_frequency: None,
        tfidf: None,
        bm25: None,
    };

    if let Some(doc_id) = req.doc_id {
        stats.term_frequency = Some(index.term_frequency(doc_id, term).map_err(error_response)?);
        stats.bm25_term_frequency = Some(
            index
                .bm25_term_frequency(doc_id, term, BM25_K1, BM25_B)
                .map_err(error_response)?,
        );
        stats.tfidf = Some(index.tfidf(doc_id, term).map_err(error_response)?);
        stats.bm25 = Some(index.bm25(doc_id, term).map_err(error_response)?);
    }

    Ok(Json(stats))
}

/// POST /api/normalize - Min-max normalize a list of scores
pub async fn normalize_scores(Json(req): Json<NormalizeRequest>) -> Json<Vec<f32>> {
    Json(normalize(&req.scores))
}

/// POST /api/chunk - Split text into word or sentence windows
pub async fn chunk_text(Json(req): Json<ChunkRequest>) -> Json<ChunkResponse> {
    let chunks = req.strategy.chunk(&req.text, req.size, req.overlap);
    tracing::debug!("Split {} chars into {} chunks", req.text.len(), chunks.len());
    Json(ChunkResponse {
        strategy: req.strategy,
        chunks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::ChunkStrategy;

    #[tokio::test]
    async fn test_chunk_text_sentences() {
        let req: ChunkRequest = serde_json::from_str(
            r#"{"text": "A bear. In London. Eats marmalade.", "strategy": "sentences", "size": 2}"#,
        )
        .unwrap();
        let Json(resp) = chunk_text(Json(req)).await;
        assert_eq!(resp.strategy, ChunkStrategy::Sentences);
        assert_eq!(resp.chunks, vec!["A bear. In London.", "Eats marmalade."]);
    }

    #[tokio::test]
    async fn test_chunk_text_defaults_to_words() {
        let req: ChunkRequest = serde_json::from_str(r#"{"text": "a b c"}"#).unwrap();
        let Json(resp) = chunk_text(Json(req)).await;
        assert_eq!(resp.strategy, ChunkStrategy::Words);
        assert_eq!(resp.chunks, vec!["a b c"]);
    }
}
