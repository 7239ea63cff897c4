use parking_lot::RwLock;
use std::sync::Arc;

use crate::chunking::ChunkConfig;
use crate::config::Config;
use crate::corpus;
use crate::error::{Result, SearchError};
use crate::llm::cross_encoder::HttpCrossEncoder;
use crate::llm::embeddings::HttpEmbedder;
use crate::llm::generator::HttpGenerator;
use crate::llm::{CrossEncoder, Embedder, Generator};
use crate::models::Document;
use crate::search::bm25::{IndexPaths, InvertedIndex};
use crate::search::hybrid::HybridSearch;
use crate::search::semantic::DocumentVectorStore;
use crate::search::vector::ChunkVectorStore;
use crate::text::TextPreprocessor;

/// Shared application state. Built indexes are swapped in wholesale.
///
/// Vector builds run one at a time under `vector_build`; callers that
/// waited re-check the cache before building again.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub preprocessor: TextPreprocessor,
    pub embedder: Arc<dyn Embedder>,
    pub generator: Arc<dyn Generator>,
    pub cross_encoder: Option<Arc<dyn CrossEncoder>>,
    lexical: Arc<RwLock<Option<Arc<InvertedIndex>>>>,
    chunks: Arc<RwLock<Option<Arc<ChunkVectorStore>>>>,
    whole_documents: Arc<RwLock<Option<Arc<DocumentVectorStore>>>>,
    vector_build: Arc<tokio::sync::Mutex<()>>,
}

impl AppState {
    /// State backed by the configured HTTP model providers.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        std::fs::create_dir_all(config.index_dir())?;
        std::fs::create_dir_all(config.vector_dir())?;

        let http_client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .timeout(std::time::Duration::from_secs(120))
            .build()?;

        let embedder: Arc<dyn Embedder> =
            Arc::new(HttpEmbedder::new(http_client.clone(), config.llm.clone()));
        let generator: Arc<dyn Generator> =
            Arc::new(HttpGenerator::new(http_client.clone(), config.llm.clone()));
        let cross_encoder: Option<Arc<dyn CrossEncoder>> =
            config.reranker.base_url.as_ref().map(|_| {
                Arc::new(HttpCrossEncoder::new(
                    http_client.clone(),
                    config.reranker.clone(),
                    config.llm.retry_policy(),
                )) as Arc<dyn CrossEncoder>
            });

        Ok(Self::with_collaborators(
            config,
            embedder,
            generator,
            cross_encoder,
        ))
    }

    /// State with injected collaborators. The lexical index is loaded if one
    /// was built before; nothing is built here.
    pub fn with_collaborators(
        config: Config,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
        cross_encoder: Option<Arc<dyn CrossEncoder>>,
    ) -> Self {
        let preprocessor = TextPreprocessor::from_stopword_file(&config.stopwords_path());

        let paths = IndexPaths::new(config.index_dir());
        let lexical = match InvertedIndex::load(&paths, preprocessor.clone()) {
            Ok(index) => {
                tracing::info!("Loaded lexical index with {} documents", index.len());
                Some(Arc::new(index))
            }
            Err(SearchError::IndexNotFound(_)) => {
                tracing::info!("No lexical index at {}; build it first", paths.root.display());
                None
            }
            Err(e) => {
                tracing::warn!("Failed to load lexical index: {e}");
                None
            }
        };

        Self {
            config,
            preprocessor,
            embedder,
            generator,
            cross_encoder,
            lexical: Arc::new(RwLock::new(lexical)),
            chunks: Arc::new(RwLock::new(None)),
            whole_documents: Arc::new(RwLock::new(None)),
            vector_build: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    pub fn load_documents(&self) -> Result<Vec<Document>> {
        corpus::load_movies(&self.config.movies_path())
    }

    /// Build the lexical index from the corpus, persist it and swap it in.
    pub fn build_lexical_index(&self) -> Result<Arc<InvertedIndex>> {
        let documents = self.load_documents()?;
        let index = InvertedIndex::build(self.preprocessor.clone(), &documents);
        index.save(&IndexPaths::new(self.config.index_dir()))?;
        tracing::info!("Built lexical index over {} documents", index.len());

        let index = Arc::new(index);
        *self.lexical.write() = Some(index.clone());
        Ok(index)
    }

    /// The current lexical index. Never builds one implicitly.
    pub fn lexical_index(&self) -> Result<Arc<InvertedIndex>> {
        if let Some(index) = self.lexical.read().as_ref() {
            return Ok(index.clone());
        }
        let index = Arc::new(InvertedIndex::load(
            &IndexPaths::new(self.config.index_dir()),
            self.preprocessor.clone(),
        )?);
        *self.lexical.write() = Some(index.clone());
        Ok(index)
    }

    /// Load the chunk vector cache, rebuilding it when it is missing or stale.
    pub async fn build_or_load_vector_index(&self) -> Result<Arc<ChunkVectorStore>> {
        let _guard = self.vector_build.lock().await;
        self.load_chunk_store().await
    }

    pub async fn vector_index(&self) -> Result<Arc<ChunkVectorStore>> {
        let cached = self.chunks.read().clone();
        if let Some(store) = cached {
            return Ok(store);
        }

        let _guard = self.vector_build.lock().await;
        let cached = self.chunks.read().clone();
        match cached {
            Some(store) => Ok(store),
            None => self.load_chunk_store().await,
        }
    }

    pub async fn document_vectors(&self) -> Result<Arc<DocumentVectorStore>> {
        let cached = self.whole_documents.read().clone();
        if let Some(store) = cached {
            return Ok(store);
        }

        let _guard = self.vector_build.lock().await;
        let cached = self.whole_documents.read().clone();
        if let Some(store) = cached {
            return Ok(store);
        }

        let documents = self.load_documents()?;
        let store = Arc::new(
            DocumentVectorStore::load_or_build(
                &self.config.vector_dir(),
                &documents,
                self.embedder.clone(),
            )
            .await?,
        );
        *self.whole_documents.write() = Some(store.clone());
        Ok(store)
    }

    /// Caller must hold `vector_build`.
    async fn load_chunk_store(&self) -> Result<Arc<ChunkVectorStore>> {
        let documents = self.load_documents()?;
        let store = ChunkVectorStore::load_or_build(
            &self.config.vector_dir(),
            documents,
            self.embedder.clone(),
            ChunkConfig::default(),
        )
        .await?;

        let store = Arc::new(store);
        *self.chunks.write() = Some(store.clone());
        Ok(store)
    }

    /// Hybrid engine over the current indexes with every configured collaborator.
    pub async fn engine(&self) -> Result<HybridSearch> {
        let index = self.lexical_index()?;
        let vectors = self.vector_index().await?;
        let mut engine =
            HybridSearch::new(index, vectors).with_generator(self.generator.clone());
        if let Some(cross_encoder) = &self.cross_encoder {
            engine = engine.with_cross_encoder(cross_encoder.clone());
        }
        Ok(engine)
    }
}
