//! Retrieval quality against a golden dataset: precision@k, recall@k and F1.

use serde::Serialize;

use crate::error::Result;
use crate::models::GoldenCase;
use crate::search::hybrid::{HybridSearch, DEFAULT_RRF_K};

#[derive(Debug, Clone, Serialize)]
pub struct CaseReport {
    pub query: String,
    pub precision: f32,
    pub recall: f32,
    pub f1: f32,
    pub retrieved: Vec<String>,
    pub relevant: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    pub limit: usize,
    pub cases: Vec<CaseReport>,
    pub mean_precision: f32,
    pub mean_recall: f32,
    pub mean_f1: f32,
}

/// Relevant hits over retrieved count; 0 when nothing was retrieved.
pub fn precision(relevant_retrieved: usize, retrieved: usize) -> f32 {
    ratio(relevant_retrieved, retrieved)
}

/// Relevant hits over relevant-set size; 0 when the relevant set is empty.
pub fn recall(relevant_retrieved: usize, relevant: usize) -> f32 {
    ratio(relevant_retrieved, relevant)
}

pub fn f1(precision: f32, recall: f32) -> f32 {
    if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    }
}

fn ratio(num: usize, den: usize) -> f32 {
    if den == 0 {
        0.0
    } else {
        num as f32 / den as f32
    }
}

/// Score one case given the titles retrieved for its query.
pub fn score_case(case: &GoldenCase, retrieved: Vec<String>) -> CaseReport {
    let hits = retrieved
        .iter()
        .filter(|title| case.relevant_docs.contains(title))
        .count();
    let p = precision(hits, retrieved.len());
    let r = recall(hits, case.relevant_docs.len());
    CaseReport {
        query: case.query.clone(),
        precision: p,
        recall: r,
        f1: f1(p, r),
        retrieved,
        relevant: case.relevant_docs.clone(),
    }
}

/// Run plain RRF search (k = 60, no enhancement or re-ranking) for every case.
pub async fn evaluate(
    engine: &HybridSearch,
    cases: &[GoldenCase],
    limit: usize,
) -> Result<EvaluationReport> {
    let mut reports = Vec::with_capacity(cases.len());
    for case in cases {
        let response = engine
            .rrf_search(&case.query, DEFAULT_RRF_K, limit, None, None, false)
            .await?;
        let titles = response.results.into_iter().map(|h| h.title).collect();
        let report = score_case(case, titles);
        tracing::info!(
            "Query '{}': precision@{limit} {:.4}, recall@{limit} {:.4}, F1 {:.4}",
            report.query,
            report.precision,
            report.recall,
            report.f1
        );
        reports.push(report);
    }

    let n = reports.len();
    let mean = |f: fn(&CaseReport) -> f32| {
        if n == 0 {
            0.0
        } else {
            reports.iter().map(f).sum::<f32>() / n as f32
        }
    };

    Ok(EvaluationReport {
        limit,
        mean_precision: mean(|c| c.precision),
        mean_recall: mean(|c| c.recall),
        mean_f1: mean(|c| c.f1),
        cases: reports,
    })
}
