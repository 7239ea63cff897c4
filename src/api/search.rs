use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::Json;

use super::{error_response, ApiError};
use crate::models::{
    ImageSearchParams, RrfSearchRequest, ScoredDocument, SearchResponse, SemanticSearchRequest,
    WeightedSearchRequest,
};
use crate::state::AppState;

/// POST /api/search/weighted - Min-max normalized BM25 + semantic blend
pub async fn weighted_search(
    State(state): State<AppState>,
    Json(req): Json<WeightedSearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    let engine = state.engine().await.map_err(error_response)?;
    let response = engine
        .weighted_search(req.query.trim(), req.alpha, req.limit)
        .await
        .map_err(error_response)?;
    Ok(Json(response))
}

/// POST /api/search/rrf - Full pipeline:
///   1. Optional query enhancement (spell / rewrite / expand)
///   2. BM25 + chunked semantic candidates, reciprocal rank fusion
///   3. Optional re-ranking (pointwise / listwise / cross-encoder)
///   4. Optional 0-3 relevance evaluation of the final results
pub async fn rrf_search(
    State(state): State<AppState>,
    Json(req): Json<RrfSearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    let engine = state.engine().await.map_err(error_response)?;
    let response = engine
        .rrf_search(
            req.query.trim(),
            req.k,
            req.limit,
            req.enhance,
            req.rerank,
            req.evaluate,
        )
        .await
        .map_err(error_response)?;

    tracing::info!(
        "RRF search '{}' returned {} results",
        response.effective_query,
        response.results.len()
    );
    Ok(Json(response))
}

/// POST /api/semantic/search - Chunked semantic search
pub async fn semantic_search(
    State(state): State<AppState>,
    Json(req): Json<SemanticSearchRequest>,
) -> Result<Json<Vec<ScoredDocument>>, ApiError> {
    let store = state.vector_index().await.map_err(error_response)?;
    let results = store
        .search(req.query.trim(), req.limit)
        .await
        .map_err(error_response)?;
    Ok(Json(results))
}

/// POST /api/semantic/document - Whole-document semantic search
pub async fn document_search(
    State(state): State<AppState>,
    Json(req): Json<SemanticSearchRequest>,
) -> Result<Json<Vec<ScoredDocument>>, ApiError> {
    let store = state.document_vectors().await.map_err(error_response)?;
    let results = store
        .search(req.query.trim(), req.limit)
        .await
        .map_err(error_response)?;
    Ok(Json(results))
}

/// POST /api/semantic/image?limit=N - Rank documents against raw image bytes
pub async fn image_search(
    State(state): State<AppState>,
    Query(params): Query<ImageSearchParams>,
    body: Bytes,
) -> Result<Json<Vec<ScoredDocument>>, ApiError> {
    let store = state.document_vectors().await.map_err(error_response)?;
    let results = store
        .search_with_image(&body, params.limit)
        .await
        .map_err(error_response)?;
    Ok(Json(results))
}
