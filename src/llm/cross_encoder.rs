//! Cross-encoder relevance scoring via an OpenAI-compatible `/v1/rerank` endpoint.
//!
//! Sends a single batch request with all query-document pairs instead of
//! making N individual generator calls.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::RerankerConfig;
use crate::error::SearchError;
use crate::llm::{CrossEncoder, RetryPolicy};

/// HTTP cross-encoder client (e.g. llama-server hosting a reranker model).
pub struct HttpCrossEncoder {
    client: reqwest::Client,
    config: RerankerConfig,
    retry: RetryPolicy,
}

impl HttpCrossEncoder {
    pub fn new(client: reqwest::Client, config: RerankerConfig, retry: RetryPolicy) -> Self {
        let retry = RetryPolicy {
            timeout: std::time::Duration::from_secs(config.timeout_secs.min(30)),
            ..retry
        };
        Self {
            client,
            config,
            retry,
        }
    }
}

#[async_trait]
impl CrossEncoder for HttpCrossEncoder {
    async fn score(&self, query: &str, documents: &[String]) -> crate::error::Result<Vec<f32>> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }
        let raw = rerank(&self.client, &self.config, &self.retry, query, documents)
            .await
            .map_err(|e| SearchError::CrossEncoderFailure(format!("{e:#}")))?;
        scores_by_index(raw, documents.len())
    }
}

/// Result of scoring a single document.
#[derive(Debug, Clone)]
pub struct RerankResult {
    /// Index into the original documents array.
    pub index: usize,
    /// Relevance score (0.0 - 1.0 after sigmoid normalization).
    pub score: f32,
}

async fn rerank(
    client: &reqwest::Client,
    config: &RerankerConfig,
    retry: &RetryPolicy,
    query: &str,
    documents: &[String],
) -> Result<Vec<RerankResult>> {
    let base_url = config
        .base_url
        .as_deref()
        .context("Reranker base_url not configured")?;

    let model = config.model.as_deref().unwrap_or("default");

    let url = format!("{}/v1/rerank", base_url.trim_end_matches('/'));

    let req_body = RerankRequest {
        model: model.to_string(),
        query: query.to_string(),
        documents: documents.to_vec(),
        top_n: documents.len(),
    };

    let body: RerankResponse = retry
        .run("Cross-encoder rerank", || async {
            let resp = client
                .post(&url)
                .json(&req_body)
                .send()
                .await
                .context("Failed to reach reranker endpoint")?;

            if !resp.status().is_success() {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                anyhow::bail!("Reranker returned {status}: {body}");
            }

            resp.json()
                .await
                .context("Failed to parse reranker response")
        })
        .await?;

    Ok(body
        .results
        .into_iter()
        .map(|r| RerankResult {
            index: r.index,
            score: sigmoid(r.relevance_score),
        })
        .collect())
}

/// Lay endpoint results back out parallel to the input documents.
/// Every document must be scored exactly once.
fn scores_by_index(results: Vec<RerankResult>, len: usize) -> crate::error::Result<Vec<f32>> {
    let mut scores: Vec<Option<f32>> = vec![None; len];
    for r in results {
        match scores.get_mut(r.index) {
            Some(slot) if slot.is_none() => *slot = Some(r.score),
            _ => {
                return Err(SearchError::InvalidResponse(format!(
                    "reranker returned unexpected index {}",
                    r.index
                )))
            }
        }
    }
    scores
        .into_iter()
        .enumerate()
        .map(|(i, s)| {
            s.ok_or_else(|| {
                SearchError::InvalidResponse(format!("reranker did not score document {i}"))
            })
        })
        .collect()
}

/// Sigmoid normalization: maps raw logits to 0-1 range.
pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

// ─── Request/Response types ────────────────────────────

#[derive(Serialize)]
struct RerankRequest {
    model: String,
    query: String,
    documents: Vec<String>,
    top_n: usize,
}

#[derive(Deserialize)]
struct RerankResponse {
    results: Vec<RerankResultRaw>,
}

#[derive(Deserialize)]
struct RerankResultRaw {
    index: usize,
    relevance_score: f32,
}
