use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::error::SearchError;
use crate::llm::{Embedder, RetryPolicy};

/// Maximum characters to send per text to the embedding API.
/// Movie descriptions are short; this only guards against pathological
/// inputs exceeding the model's context window.
const MAX_EMBED_CHARS: usize = 3_000;

/// Truncate `text` to at most `MAX_EMBED_CHARS`, splitting on a UTF-8 char boundary.
fn truncate_for_embedding(text: &str) -> &str {
    if text.len() <= MAX_EMBED_CHARS {
        return text;
    }
    // Find the last char boundary at or before the limit
    let mut end = MAX_EMBED_CHARS;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Embedding client for Ollama or OpenAI-compatible APIs.
pub struct HttpEmbedder {
    client: reqwest::Client,
    config: LlmConfig,
    retry: RetryPolicy,
}

impl HttpEmbedder {
    pub fn new(client: reqwest::Client, config: LlmConfig) -> Self {
        let retry = config.retry_policy();
        Self {
            client,
            config,
            retry,
        }
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    fn model_id(&self) -> String {
        format!("{}:{}", self.config.provider, self.config.embedding_model)
    }

    async fn embed_batch(&self, texts: &[String]) -> crate::error::Result<Vec<Vec<f32>>> {
        let embeddings = embed_batch(&self.client, &self.config, &self.retry, texts)
            .await
            .map_err(|e| SearchError::EmbeddingUnavailable(format!("{e:#}")))?;

        if embeddings.len() != texts.len() {
            return Err(SearchError::EmbeddingUnavailable(format!(
                "expected {} embeddings, provider returned {}",
                texts.len(),
                embeddings.len()
            )));
        }
        Ok(embeddings)
    }
}

/// Generate embeddings for a batch of texts using the configured LLM provider.
pub async fn embed_batch(
    client: &reqwest::Client,
    config: &LlmConfig,
    retry: &RetryPolicy,
    texts: &[String],
) -> Result<Vec<Vec<f32>>> {
    if texts.is_empty() {
        return Ok(Vec::new());
    }

    let truncated: Vec<String> = texts
        .iter()
        .map(|t| truncate_for_embedding(t).to_string())
        .collect();

    match config.provider.as_str() {
        "ollama" => embed_ollama(client, config, retry, &truncated).await,
        "openai" => embed_openai(client, config, retry, &truncated).await,
        other => anyhow::bail!("Unknown LLM provider: {other}"),
    }
}

// ─── Ollama ──────────────────────────────────────────────

#[derive(Serialize)]
struct OllamaEmbedRequest {
    model: String,
    input: Vec<String>,
    /// Ask Ollama to silently truncate inputs that exceed the model's context
    /// length instead of returning a 400 error.
    truncate: bool,
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

async fn embed_ollama(
    client: &reqwest::Client,
    config: &LlmConfig,
    retry: &RetryPolicy,
    texts: &[String],
) -> Result<Vec<Vec<f32>>> {
    let url = format!("{}/api/embed", config.base_url);

    // Ollama supports batch embedding with the /api/embed endpoint
    let batch_size = 32;
    let mut all_embeddings = Vec::new();

    for chunk in texts.chunks(batch_size) {
        let req = OllamaEmbedRequest {
            model: config.embedding_model.clone(),
            input: chunk.to_vec(),
            truncate: true,
        };

        let body: OllamaEmbedResponse = retry
            .run("Ollama embed", || async {
                let resp = client
                    .post(&url)
                    .json(&req)
                    .send()
                    .await
                    .context("Failed to call Ollama embed API")?;

                if !resp.status().is_success() {
                    let status = resp.status();
                    let body = resp.text().await.unwrap_or_default();
                    anyhow::bail!("Ollama embed API returned {status}: {body}");
                }

                resp.json()
                    .await
                    .context("Failed to parse Ollama embed response")
            })
            .await?;

        all_embeddings.extend(body.embeddings);
    }

    Ok(all_embeddings)
}

// ─── OpenAI-compatible ───────────────────────────────────

#[derive(Serialize)]
struct OpenAiEmbedRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct OpenAiEmbedResponse {
    data: Vec<OpenAiEmbedData>,
}

#[derive(Deserialize)]
struct OpenAiEmbedData {
    embedding: Vec<f32>,
}

async fn embed_openai(
    client: &reqwest::Client,
    config: &LlmConfig,
    retry: &RetryPolicy,
    texts: &[String],
) -> Result<Vec<Vec<f32>>> {
    let url = format!("{}/v1/embeddings", config.base_url);
    let api_key = config.api_key.as_deref().unwrap_or_default();

    let batch_size = 64;
    let mut all_embeddings = Vec::new();

    for chunk in texts.chunks(batch_size) {
        let req = OpenAiEmbedRequest {
            model: config.embedding_model.clone(),
            input: chunk.to_vec(),
        };

        let body: OpenAiEmbedResponse = retry
            .run("OpenAI embed", || async {
                let resp = client
                    .post(&url)
                    .header("Authorization", format!("Bearer {api_key}"))
                    .json(&req)
                    .send()
                    .await
                    .context("Failed to call OpenAI embed API")?;

                if !resp.status().is_success() {
                    let status = resp.status();
                    let body = resp.text().await.unwrap_or_default();
                    anyhow::bail!("OpenAI embed API returned {status}: {body}");
                }

                resp.json()
                    .await
                    .context("Failed to parse OpenAI embed response")
            })
            .await?;

        all_embeddings.extend(body.data.into_iter().map(|d| d.embedding));
    }

    Ok(all_embeddings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short_text_untouched() {
        assert_eq!(truncate_for_embedding("A bear in London."), "A bear in London.");
    }

    #[test]
    fn test_truncate_respects_char_boundary() {
        let text = "é".repeat(MAX_EMBED_CHARS);
        let out = truncate_for_embedding(&text);
        assert!(out.len() <= MAX_EMBED_CHARS);
        assert!(out.chars().all(|c| c == 'é'));
    }

    #[tokio::test]
    async fn test_unknown_provider_is_rejected() {
        let config = LlmConfig {
            provider: "carrier-pigeon".to_string(),
            ..LlmConfig::default()
        };
        let embedder = HttpEmbedder::new(reqwest::Client::new(), config);
        let err = embedder
            .embed_batch(&["bear".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::EmbeddingUnavailable(_)));
    }

    #[tokio::test]
    async fn test_empty_batch_makes_no_call() {
        let embedder = HttpEmbedder::new(reqwest::Client::new(), LlmConfig::default());
        assert!(embedder.embed_batch(&[]).await.unwrap().is_empty());
    }

    #[test]
    fn test_model_id_includes_provider() {
        let embedder = HttpEmbedder::new(reqwest::Client::new(), LlmConfig::default());
        assert_eq!(embedder.model_id(), "ollama:nomic-embed-text");
    }
}
