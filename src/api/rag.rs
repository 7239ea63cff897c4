use axum::extract::State;
use axum::Json;

use super::{error_response, ApiError};
use crate::corpus;
use crate::evaluation::{self, EvaluationReport};
use crate::llm::answer;
use crate::models::{AnswerRequest, AnswerResponse, EvaluateRequest};
use crate::search::hybrid::DEFAULT_RRF_K;
use crate::state::AppState;

/// POST /api/answer - RRF search, then one generator call over the hits
pub async fn answer_query(
    State(state): State<AppState>,
    Json(req): Json<AnswerRequest>,
) -> Result<Json<AnswerResponse>, ApiError> {
    let query = req.query.trim();
    let engine = state.engine().await.map_err(error_response)?;
    let search = engine
        .rrf_search(query, DEFAULT_RRF_K, req.limit, None, None, false)
        .await
        .map_err(error_response)?;

    let text = answer::answer(state.generator.as_ref(), req.mode, query, &search.results)
        .await
        .map_err(error_response)?;

    Ok(Json(AnswerResponse {
        query: query.to_string(),
        mode: req.mode,
        sources: search.results,
        answer: text,
    }))
}

/// POST /api/evaluate - Precision / recall / F1 over the golden dataset
pub async fn evaluate(
    State(state): State<AppState>,
    Json(req): Json<EvaluateRequest>,
) -> Result<Json<EvaluationReport>, ApiError> {
    let cases = corpus::load_golden_dataset(&state.config.golden_path()).map_err(error_response)?;
    let engine = state.engine().await.map_err(error_response)?;
    let report = evaluation::evaluate(&engine, &cases, req.limit)
        .await
        .map_err(error_response)?;
    Ok(Json(report))
}
