//! Post-fusion re-ranking and relevance evaluation.
//!
//! Three strategies re-order a fused candidate list:
//!
//! - **pointwise**: one generator call per hit, each returning a 0-10 score
//! - **listwise**: one generator call returning the preferred id order
//! - **cross-encoder**: one batch call to a [`CrossEncoder`]
//!
//! The generator strategies and [`evaluate`] degrade: on any failure the
//! caller keeps what it had. Cross-encoder failures propagate.

use std::collections::{HashMap, HashSet};

use crate::error::{Result, SearchError};
use crate::llm::{extract_json_span, CrossEncoder, Generator};
use crate::models::{RerankMode, SearchHit};

/// Collaborators available to the re-ranking stage.
#[derive(Clone, Copy, Default)]
pub struct Rerankers<'a> {
    pub generator: Option<&'a dyn Generator>,
    pub cross_encoder: Option<&'a dyn CrossEncoder>,
}

/// Re-rank `hits` with `mode`, applying the failure policy of each strategy.
/// Pointwise and listwise failures are logged and the fused order returned.
pub async fn rerank(
    mode: RerankMode,
    rerankers: Rerankers<'_>,
    query: &str,
    hits: Vec<SearchHit>,
) -> Result<Vec<SearchHit>> {
    match mode {
        RerankMode::CrossEncoder => {
            let encoder = rerankers.cross_encoder.ok_or_else(|| {
                SearchError::CrossEncoderFailure("no cross-encoder configured".to_string())
            })?;
            rerank_cross_encoder(encoder, query, hits).await
        }
        RerankMode::Pointwise | RerankMode::Listwise => {
            let Some(generator) = rerankers.generator else {
                tracing::warn!("{mode:?} rerank requested without a generator; keeping fused order");
                return Ok(hits);
            };
            let attempt = match mode {
                RerankMode::Pointwise => rerank_pointwise(generator, query, &hits).await,
                _ => rerank_listwise(generator, query, &hits).await,
            };
            match attempt {
                Ok(reranked) => Ok(reranked),
                Err(e) => {
                    tracing::warn!("{mode:?} rerank failed, keeping fused order: {e}");
                    Ok(hits)
                }
            }
        }
    }
}

/// Score every hit 0-10 and sort descending (stable). Any failed call
/// aborts the whole stage so no partially scored list escapes.
pub async fn rerank_pointwise(
    generator: &dyn Generator,
    query: &str,
    hits: &[SearchHit],
) -> Result<Vec<SearchHit>> {
    let mut scores = Vec::with_capacity(hits.len());
    for hit in hits {
        let response = generator.complete(&pointwise_prompt(query, hit)).await?;
        scores.push(parse_pointwise_score(&response)?);
    }

    let mut reranked: Vec<SearchHit> = hits
        .iter()
        .cloned()
        .zip(scores)
        .map(|(mut hit, score)| {
            hit.rerank_score = Some(score);
            hit
        })
        .collect();
    sort_by_rerank_score(&mut reranked);
    Ok(reranked)
}

/// Ask for a JSON list of ids in relevance order and reorder accordingly.
/// Ids the generator omits keep their fused order after the ranked ones.
pub async fn rerank_listwise(
    generator: &dyn Generator,
    query: &str,
    hits: &[SearchHit],
) -> Result<Vec<SearchHit>> {
    if hits.is_empty() {
        return Ok(Vec::new());
    }
    let response = generator.complete(&listwise_prompt(query, hits)).await?;
    let order = parse_id_list(&response)?;
    reorder_by_ids(hits, &order)
}

/// Score (query, "title - description") pairs in one batch and sort descending.
pub async fn rerank_cross_encoder(
    encoder: &dyn CrossEncoder,
    query: &str,
    mut hits: Vec<SearchHit>,
) -> Result<Vec<SearchHit>> {
    if hits.is_empty() {
        return Ok(hits);
    }
    let pairs: Vec<String> = hits.iter().map(SearchHit::display_text).collect();
    let scores = encoder.score(query, &pairs).await?;
    if scores.len() != hits.len() {
        return Err(SearchError::CrossEncoderFailure(format!(
            "expected {} scores, got {}",
            hits.len(),
            scores.len()
        )));
    }

    for (hit, score) in hits.iter_mut().zip(scores) {
        hit.rerank_score = Some(score);
    }
    sort_by_rerank_score(&mut hits);
    Ok(hits)
}

/// Attach a 0-3 relevance label to each hit. Order is untouched.
pub async fn evaluate(generator: &dyn Generator, query: &str, hits: &mut [SearchHit]) -> Result<()> {
    if hits.is_empty() {
        return Ok(());
    }
    let response = generator.complete(&evaluation_prompt(query, hits)).await?;
    let labels = parse_relevance_labels(&response)?;

    for (hit, label) in hits.iter_mut().zip(labels) {
        hit.llm_relevance = Some(label);
    }
    Ok(())
}

fn sort_by_rerank_score(hits: &mut [SearchHit]) {
    hits.sort_by(|a, b| {
        let a = a.rerank_score.unwrap_or(f32::NEG_INFINITY);
        let b = b.rerank_score.unwrap_or(f32::NEG_INFINITY);
        b.partial_cmp(&a).unwrap_or(std::cmp::Ordering::Equal)
    });
}

fn reorder_by_ids(hits: &[SearchHit], order: &[u32]) -> Result<Vec<SearchHit>> {
    let by_id: HashMap<u32, &SearchHit> = hits.iter().map(|h| (h.id, h)).collect();
    let mut placed = HashSet::new();
    let mut reordered = Vec::with_capacity(hits.len());

    for id in order {
        let hit = by_id.get(id).ok_or_else(|| {
            SearchError::InvalidResponse(format!("listwise rerank returned unknown id {id}"))
        })?;
        if placed.insert(*id) {
            reordered.push((*hit).clone());
        }
    }
    reordered.extend(hits.iter().filter(|h| !placed.contains(&h.id)).cloned());
    Ok(reordered)
}

fn parse_pointwise_score(content: &str) -> Result<f32> {
    let trimmed = content.trim();
    let score: f32 = trimmed.parse().map_err(|_| {
        SearchError::InvalidResponse(format!("expected a 0-10 score, got '{trimmed}'"))
    })?;
    if !score.is_finite() {
        return Err(SearchError::InvalidResponse(format!(
            "non-finite score '{trimmed}'"
        )));
    }
    Ok(score.clamp(0.0, 10.0))
}

fn parse_id_list(content: &str) -> Result<Vec<u32>> {
    serde_json::from_str(extract_json_span(content, '[', ']')).map_err(|e| {
        SearchError::InvalidResponse(format!("expected a JSON list of ids: {e}"))
    })
}

fn parse_relevance_labels(content: &str) -> Result<Vec<u8>> {
    let raw: Vec<f64> = serde_json::from_str(extract_json_span(content, '[', ']'))
        .map_err(|e| SearchError::InvalidResponse(format!("expected a JSON list of 0-3 scores: {e}")))?;
    Ok(raw.into_iter().map(|v| v.round().clamp(0.0, 3.0) as u8).collect())
}

fn pointwise_prompt(query: &str, hit: &SearchHit) -> String {
    format!(
        "Rate how well this movie matches the search query.\n\n\
         Query: \"{query}\"\n\
         Movie: {}\n\n\
         Consider:\n\
         - Direct relevance to query\n\
         - User intent (what they're looking for)\n\
         - Content appropriateness\n\n\
         Rate 0-10 (10 = perfect match).\n\
         Give me ONLY the number in your response, no other text or explanation.\n\n\
         Score:",
        hit.display_text()
    )
}

fn listwise_prompt(query: &str, hits: &[SearchHit]) -> String {
    let movies: Vec<String> = hits
        .iter()
        .map(|h| format!("ID: {}, Title: {}, Description: {}", h.id, h.title, h.description))
        .collect();
    format!(
        "Rank these movies by relevance to the search query.\n\n\
         Query: \"{query}\"\n\n\
         Movies:\n{}\n\n\
         Return ONLY the IDs in order of relevance (best match first). \
         Return a valid JSON list, nothing else. For example:\n\n\
         [75, 12, 34, 2, 1]\n",
        movies.join("\n")
    )
}

fn evaluation_prompt(query: &str, hits: &[SearchHit]) -> String {
    let results: Vec<String> = hits.iter().map(SearchHit::display_text).collect();
    format!(
        "Rate how relevant each result is to this query on a 0-3 scale:\n\n\
         Query: \"{query}\"\n\n\
         Results:\n{}\n\n\
         Scale:\n\
         - 3: Highly relevant\n\
         - 2: Relevant\n\
         - 1: Marginally relevant\n\
         - 0: Not relevant\n\n\
         Do NOT give any numbers other than 0, 1, 2, or 3.\n\n\
         Return ONLY the scores in the same order you were given the documents. \
         Return a valid JSON list, nothing else. For example:\n\n\
         [2, 0, 3, 2, 0, 1]",
        results.join("\n")
    )
}
