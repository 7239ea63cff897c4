use axum::extract::State;
use axum::Json;

use super::{error_response, ApiError};
use crate::models::{BuildResponse, HealthResponse, VectorIndexResponse};
use crate::search::bm25::IndexPaths;
use crate::search::vector::CHUNK_METADATA_FILE;
use crate::state::AppState;

/// GET /api/health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        lexical_index: IndexPaths::new(state.config.index_dir()).exists(),
        vector_index: state.config.vector_dir().join(CHUNK_METADATA_FILE).is_file(),
    })
}

/// POST /api/index/build - Rebuild the lexical index from the corpus file
pub async fn build_index(State(state): State<AppState>) -> Result<Json<BuildResponse>, ApiError> {
    let index = tokio::task::spawn_blocking(move || state.build_lexical_index())
        .await
        .map_err(|e| {
            (
                axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                format!("Index build task failed: {e}"),
            )
        })?
        .map_err(error_response)?;

    Ok(Json(BuildResponse {
        documents: index.len(),
        avg_doc_length: index.avg_doc_length(),
    }))
}

/// POST /api/index/vectors - Load the chunk embedding cache, rebuilding it if stale
pub async fn build_vectors(
    State(state): State<AppState>,
) -> Result<Json<VectorIndexResponse>, ApiError> {
    let store = state
        .build_or_load_vector_index()
        .await
        .map_err(error_response)?;

    let documents = store
        .metadata()
        .iter()
        .map(|m| m.document_index)
        .collect::<std::collections::HashSet<_>>()
        .len();

    Ok(Json(VectorIndexResponse {
        documents,
        chunks: store.len(),
    }))
}
