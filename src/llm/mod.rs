//! External model collaborators and the LLM-driven pipeline stages.
//!
//! The retrieval core only talks to models through the [`Embedder`],
//! [`Generator`] and [`CrossEncoder`] traits; concrete HTTP providers live in
//! the submodules and are injected by the caller.

pub mod answer;
pub mod cross_encoder;
pub mod embeddings;
pub mod enhance;
pub mod generator;
pub mod rerank;

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

use crate::error::{Result, SearchError};

/// Turns text (or an image) into a fixed-length vector. Must be
/// deterministic for identical input so cached vectors stay valid.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Identifier stored alongside cached vectors; a change forces a rebuild.
    fn model_id(&self) -> String;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(SearchError::InvalidQuery(
                "empty text cannot be embedded".to_string(),
            ));
        }
        self.embed_batch(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| SearchError::EmbeddingUnavailable("no embedding returned".to_string()))
    }

    async fn embed_image(&self, _image: &[u8]) -> Result<Vec<f32>> {
        Err(SearchError::EmbeddingUnavailable(format!(
            "{} does not accept image input",
            self.model_id()
        )))
    }
}

/// Single-turn text generation.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Joint (query, document) relevance scorer. One call scores a whole batch;
/// the returned scores are parallel to `documents`.
#[async_trait]
pub trait CrossEncoder: Send + Sync {
    async fn score(&self, query: &str, documents: &[String]) -> Result<Vec<f32>>;
}

/// Timeout and bounded retry applied to every outbound model call.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub timeout: Duration,
    pub max_retries: u32,
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            max_retries: 2,
            initial_backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Run `op` under the timeout, retrying failures with exponential backoff.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> anyhow::Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let mut attempt = 0u32;
        loop {
            let result = match tokio::time::timeout(self.timeout, op()).await {
                Ok(r) => r,
                Err(_) => Err(anyhow::anyhow!("{what} timed out after {:?}", self.timeout)),
            };

            match result {
                Ok(v) => return Ok(v),
                Err(e) if attempt < self.max_retries => {
                    let delay = self.initial_backoff * 2u32.saturating_pow(attempt);
                    tracing::warn!(
                        "{what} failed (attempt {}/{}): {e:#}. Retrying in {delay:?}",
                        attempt + 1,
                        self.max_retries + 1
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Extract the outermost `open`..`close` span, tolerating prose or markdown
/// fences around a JSON payload.
pub(crate) fn extract_json_span(content: &str, open: char, close: char) -> &str {
    match (content.find(open), content.rfind(close)) {
        (Some(start), Some(end)) if end > start => &content[start..=end],
        _ => content.trim(),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Deterministic in-process collaborators.

    use super::*;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    const VOCAB: &[&str] = &[
        "bear", "london", "shark", "ocean", "space", "robot", "love", "war", "toy", "dinosaur",
    ];

    /// Bag-of-words embedder over a fixed vocabulary.
    #[derive(Default)]
    pub struct KeywordEmbedder {
        pub calls: Mutex<usize>,
    }

    pub fn keyword_vector(text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        VOCAB
            .iter()
            .map(|w| lower.matches(w).count() as f32)
            .collect()
    }

    #[async_trait]
    impl Embedder for KeywordEmbedder {
        fn model_id(&self) -> String {
            "keyword-test".to_string()
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            *self.calls.lock() += 1;
            Ok(texts.iter().map(|t| keyword_vector(t)).collect())
        }
    }

    /// Replays scripted responses; `Err` entries simulate provider failures.
    #[derive(Default)]
    pub struct ScriptedGenerator {
        responses: Mutex<VecDeque<std::result::Result<String, String>>>,
        pub prompts: Mutex<Vec<String>>,
    }

    impl ScriptedGenerator {
        pub fn new<I>(responses: I) -> Self
        where
            I: IntoIterator<Item = std::result::Result<&'static str, &'static str>>,
        {
            Self {
                responses: Mutex::new(
                    responses
                        .into_iter()
                        .map(|r| r.map(str::to_string).map_err(str::to_string))
                        .collect(),
                ),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Generator for ScriptedGenerator {
        async fn complete(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().push(prompt.to_string());
            match self.responses.lock().pop_front() {
                Some(Ok(text)) => Ok(text),
                Some(Err(e)) => Err(SearchError::GenerationFailure(e)),
                None => Err(SearchError::GenerationFailure("script exhausted".to_string())),
            }
        }
    }

    /// Scores a document by how many times it mentions any query word.
    pub struct OverlapCrossEncoder;

    #[async_trait]
    impl CrossEncoder for OverlapCrossEncoder {
        async fn score(&self, query: &str, documents: &[String]) -> Result<Vec<f32>> {
            let words: Vec<String> = query.split_whitespace().map(|w| w.to_lowercase()).collect();
            Ok(documents
                .iter()
                .map(|d| {
                    let lower = d.to_lowercase();
                    words.iter().map(|w| lower.matches(w.as_str()).count() as f32).sum()
                })
                .collect())
        }
    }
}
