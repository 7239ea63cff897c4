use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::llm::RetryPolicy;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Where the corpus files live
    pub data_dir: PathBuf,
    /// Where built indexes and embedding caches are stored
    pub cache_dir: PathBuf,
    /// Movie corpus (`{"movies": [...]}`); defaults to `<data_dir>/movies.json`
    pub movies_path: Option<PathBuf>,
    /// Stopword list, one word per line; defaults to `<data_dir>/stopwords.txt`
    pub stopwords_path: Option<PathBuf>,
    /// Golden evaluation set; defaults to `<data_dir>/golden_dataset.json`
    pub golden_path: Option<PathBuf>,
    /// Server bind address
    pub bind_addr: String,
    /// LLM provider configuration
    pub llm: LlmConfig,
    /// Cross-encoder reranker configuration
    pub reranker: RerankerConfig,
}

/// Configuration for the cross-encoder reranker sidecar (e.g. llama-server with a reranker model).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankerConfig {
    /// Base URL for the reranker API (e.g. "http://127.0.0.1:8082").
    /// If None, cross-encoder reranking requests fail.
    pub base_url: Option<String>,
    /// Model name to send in the rerank request.
    pub model: Option<String>,
    /// Request timeout in seconds (capped at 30).
    pub timeout_secs: u64,
}

impl Default for RerankerConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            model: None,
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// "ollama" or "openai"
    pub provider: String,
    /// Base URL for the LLM API
    pub base_url: String,
    /// Model name for enhancement, reranking and answers
    pub chat_model: String,
    /// Model name for embeddings
    pub embedding_model: String,
    /// API key (only needed for cloud providers)
    pub api_key: Option<String>,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Retries after the first failed attempt
    pub max_retries: u32,
    /// First retry delay; doubles on each further retry
    pub retry_backoff_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            cache_dir: PathBuf::from("./cache"),
            movies_path: None,
            stopwords_path: None,
            golden_path: None,
            bind_addr: "127.0.0.1:9000".to_string(),
            llm: LlmConfig::default(),
            reranker: RerankerConfig::default(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            base_url: "http://localhost:11434".to_string(),
            chat_model: "llama3.2".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            api_key: None,
            timeout_secs: 60,
            max_retries: 2,
            retry_backoff_ms: 500,
        }
    }
}

impl LlmConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            timeout: Duration::from_secs(self.timeout_secs),
            max_retries: self.max_retries,
            initial_backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("Ignoring unparseable {key}={raw}");
            None
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("MOVIE_SEARCH_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var("MOVIE_SEARCH_CACHE_DIR") {
            config.cache_dir = PathBuf::from(dir);
        }
        if let Ok(path) = std::env::var("MOVIE_SEARCH_MOVIES_PATH") {
            config.movies_path = Some(PathBuf::from(path));
        }
        if let Ok(path) = std::env::var("MOVIE_SEARCH_STOPWORDS_PATH") {
            config.stopwords_path = Some(PathBuf::from(path));
        }
        if let Ok(path) = std::env::var("MOVIE_SEARCH_GOLDEN_PATH") {
            config.golden_path = Some(PathBuf::from(path));
        }
        if let Ok(addr) = std::env::var("MOVIE_SEARCH_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Ok(provider) = std::env::var("LLM_PROVIDER") {
            config.llm.provider = provider;
        }
        if let Ok(url) = std::env::var("LLM_BASE_URL") {
            config.llm.base_url = url;
        }
        if let Ok(model) = std::env::var("LLM_CHAT_MODEL") {
            config.llm.chat_model = model;
        }
        if let Ok(model) = std::env::var("LLM_EMBEDDING_MODEL") {
            config.llm.embedding_model = model;
        }
        if let Ok(key) = std::env::var("LLM_API_KEY") {
            config.llm.api_key = Some(key);
        }
        if let Some(v) = parse_env("LLM_TIMEOUT_SECS") {
            config.llm.timeout_secs = v;
        }
        if let Some(v) = parse_env("LLM_MAX_RETRIES") {
            config.llm.max_retries = v;
        }
        if let Some(v) = parse_env("LLM_RETRY_BACKOFF_MS") {
            config.llm.retry_backoff_ms = v;
        }

        // Reranker config
        if let Ok(url) = std::env::var("RERANKER_BASE_URL") {
            config.reranker.base_url = Some(url);
        }
        if let Ok(model) = std::env::var("RERANKER_MODEL") {
            config.reranker.model = Some(model);
        }
        if let Some(v) = parse_env::<u64>("RERANKER_TIMEOUT_SECS") {
            config.reranker.timeout_secs = v.min(30); // Cap at 30s
        }

        config
    }

    pub fn movies_path(&self) -> PathBuf {
        self.movies_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join("movies.json"))
    }

    pub fn stopwords_path(&self) -> PathBuf {
        self.stopwords_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join("stopwords.txt"))
    }

    pub fn golden_path(&self) -> PathBuf {
        self.golden_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join("golden_dataset.json"))
    }

    pub fn index_dir(&self) -> PathBuf {
        self.cache_dir.join("index")
    }

    pub fn vector_dir(&self) -> PathBuf {
        self.cache_dir.join("vectors")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_paths() {
        let config = Config::default();
        assert_eq!(config.movies_path(), PathBuf::from("./data/movies.json"));
        assert_eq!(config.index_dir(), PathBuf::from("./cache/index"));
        assert_eq!(config.vector_dir(), PathBuf::from("./cache/vectors"));
    }

    #[test]
    fn test_explicit_movies_path_wins() {
        let config = Config {
            movies_path: Some(PathBuf::from("/srv/movies.json")),
            ..Config::default()
        };
        assert_eq!(config.movies_path(), PathBuf::from("/srv/movies.json"));
    }

    #[test]
    fn test_retry_policy_from_llm_config() {
        let policy = LlmConfig::default().retry_policy();
        assert_eq!(policy.timeout, Duration::from_secs(60));
        assert_eq!(policy.max_retries, 2);
        assert_eq!(policy.initial_backoff, Duration::from_millis(500));
    }
}
