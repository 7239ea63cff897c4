use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::error::SearchError;
use crate::llm::{Generator, RetryPolicy};

/// Single-turn chat client for Ollama or OpenAI-compatible APIs.
pub struct HttpGenerator {
    client: reqwest::Client,
    config: LlmConfig,
    retry: RetryPolicy,
}

impl HttpGenerator {
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
impl Generator for HttpGenerator {
    async fn complete(&self, prompt: &str) -> crate::error::Result<String> {
        let response = match self.config.provider.as_str() {
            "ollama" => call_ollama(&self.client, &self.config, &self.retry, prompt).await,
            "openai" => call_openai(&self.client, &self.config, &self.retry, prompt).await,
            other => Err(anyhow::anyhow!("Unknown LLM provider: {other}")),
        };
        response.map_err(|e| SearchError::GenerationFailure(format!("{e:#}")))
    }
}

// ─── Ollama ──────────────────────────────────────────────

#[derive(Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<Message>,
    stream: bool,
}

#[derive(Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: Message,
}

async fn call_ollama(
    client: &reqwest::Client,
    config: &LlmConfig,
    retry: &RetryPolicy,
    prompt: &str,
) -> Result<String> {
    let url = format!("{}/api/chat", config.base_url);

    let req = OllamaChatRequest {
        model: config.chat_model.clone(),
        messages: vec![Message {
            role: "user".to_string(),
            content: prompt.to_string(),
        }],
        stream: false,
    };

    let body: OllamaChatResponse = retry
        .run("Ollama chat", || async {
            let resp = client
                .post(&url)
                .json(&req)
                .send()
                .await
                .context("Failed to call Ollama chat API")?;

            if !resp.status().is_success() {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                anyhow::bail!("Ollama chat API returned {status}: {body}");
            }

            resp.json()
                .await
                .context("Failed to parse Ollama chat response")
        })
        .await?;

    Ok(body.message.content)
}

// ─── OpenAI-compatible ───────────────────────────────────

#[derive(Serialize)]
struct OpenAiChatRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    temperature: f32,
}

#[derive(Serialize)]
struct OpenAiMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct OpenAiChatResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
}

#[derive(Deserialize)]
struct OpenAiResponseMessage {
    content: String,
}

async fn call_openai(
    client: &reqwest::Client,
    config: &LlmConfig,
    retry: &RetryPolicy,
    prompt: &str,
) -> Result<String> {
    let url = format!("{}/v1/chat/completions", config.base_url);
    let api_key = config.api_key.as_deref().unwrap_or_default();

    let req = OpenAiChatRequest {
        model: config.chat_model.clone(),
        messages: vec![OpenAiMessage {
            role: "user".to_string(),
            content: prompt.to_string(),
        }],
        temperature: 0.3,
    };

    let body: OpenAiChatResponse = retry
        .run("OpenAI chat", || async {
            let resp = client
                .post(&url)
                .header("Authorization", format!("Bearer {api_key}"))
                .json(&req)
                .send()
                .await
                .context("Failed to call OpenAI chat API")?;

            if !resp.status().is_success() {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                anyhow::bail!("OpenAI chat API returned {status}: {body}");
            }

            resp.json()
                .await
                .context("Failed to parse OpenAI chat response")
        })
        .await?;

    body.choices
        .into_iter()
        .next()
        .map(|c| c.message.content)
        .context("OpenAI chat response had no choices")
}
