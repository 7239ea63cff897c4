//! Whole-document vector index: one embedding of `"{title}: {description}"`
//! per movie. Also serves image queries when the embedder accepts images.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use crate::error::{Result, SearchError};
use crate::llm::Embedder;
use crate::models::{Document, ScoredDocument};
use crate::persist;
use crate::search::vector::cosine_similarity;

pub const EMBEDDINGS_FILE: &str = "embeddings.bin";
pub const EMBEDDINGS_META_FILE: &str = "embeddings_meta.json";

#[derive(Debug, Serialize, Deserialize)]
struct EmbeddingsMeta {
    count: usize,
    model_id: String,
    built_at: DateTime<Utc>,
}

pub struct DocumentVectorStore {
    documents: Vec<Document>,
    embeddings: Vec<Vec<f32>>,
    embedder: Arc<dyn Embedder>,
}

fn embedding_text(doc: &Document) -> String {
    format!("{}: {}", doc.title, doc.description)
}

impl DocumentVectorStore {
    pub async fn build(
        dir: &Path,
        documents: &[Document],
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self> {
        let documents: Vec<Document> = documents
            .iter()
            .filter(|d| !d.title.trim().is_empty() && !d.description.trim().is_empty())
            .cloned()
            .collect();
        let texts: Vec<String> = documents.iter().map(embedding_text).collect();

        tracing::info!("Embedding {} documents", texts.len());
        let embeddings = if texts.is_empty() {
            Vec::new()
        } else {
            embedder.embed_batch(&texts).await?
        };
        if embeddings.len() != documents.len() {
            return Err(SearchError::EmbeddingUnavailable(format!(
                "expected {} document embeddings, got {}",
                documents.len(),
                embeddings.len()
            )));
        }

        persist::save_bincode(&dir.join(EMBEDDINGS_FILE), &embeddings)?;
        persist::save_json(
            &dir.join(EMBEDDINGS_META_FILE),
            &EmbeddingsMeta {
                count: embeddings.len(),
                model_id: embedder.model_id(),
                built_at: Utc::now(),
            },
        )?;

        Ok(Self {
            documents,
            embeddings,
            embedder,
        })
    }

    /// Reuse cached vectors when their count matches the embeddable
    /// documents and they came from the same model.
    pub async fn load_or_build(
        dir: &Path,
        documents: &[Document],
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self> {
        let embeddable: Vec<Document> = documents
            .iter()
            .filter(|d| !d.title.trim().is_empty() && !d.description.trim().is_empty())
            .cloned()
            .collect();

        let cached = persist::load_json::<EmbeddingsMeta>(&dir.join(EMBEDDINGS_META_FILE))
            .and_then(|meta| {
                let embeddings: Vec<Vec<f32>> = persist::load_bincode(&dir.join(EMBEDDINGS_FILE))?;
                Ok((meta, embeddings))
            });

        match cached {
            Ok((meta, embeddings))
                if embeddings.len() == embeddable.len()
                    && meta.count == embeddings.len()
                    && meta.model_id == embedder.model_id() =>
            {
                tracing::info!("Loaded {} cached document embeddings", embeddings.len());
                return Ok(Self {
                    documents: embeddable,
                    embeddings,
                    embedder,
                });
            }
            Ok(_) => tracing::info!("Document embedding cache is stale, rebuilding"),
            Err(SearchError::IndexNotFound(_)) => {}
            Err(e) => tracing::warn!("Unreadable document embedding cache, rebuilding: {e}"),
        }

        Self::build(dir, documents, embedder).await
    }

    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<ScoredDocument>> {
        let query_embedding = self.embedder.embed(query).await?;
        Ok(self.rank(&query_embedding, limit))
    }

    /// Rank documents against an image embedded by the same model.
    pub async fn search_with_image(&self, image: &[u8], limit: usize) -> Result<Vec<ScoredDocument>> {
        if image.is_empty() {
            return Err(SearchError::InvalidQuery("empty image".to_string()));
        }
        let image_embedding = self.embedder.embed_image(image).await?;
        Ok(self.rank(&image_embedding, limit))
    }

    fn rank(&self, query_embedding: &[f32], limit: usize) -> Vec<ScoredDocument> {
        let mut scored: Vec<ScoredDocument> = self
            .documents
            .iter()
            .zip(&self.embeddings)
            .map(|(doc, emb)| ScoredDocument {
                document: doc.clone(),
                score: cosine_similarity(query_embedding, emb),
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        scored
    }

    pub fn len(&self) -> usize {
        self.embeddings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.embeddings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::test_support::{keyword_vector, KeywordEmbedder};
    use async_trait::async_trait;

    fn corpus() -> Vec<Document> {
        vec![
            Document {
                id: 1,
                title: "Jaws".to_string(),
                description: "A shark in the ocean.".to_string(),
            },
            Document {
                id: 2,
                title: "Paddington".to_string(),
                description: "A bear in London.".to_string(),
            },
            Document {
                id: 3,
                title: "Untitled".to_string(),
                description: String::new(),
            },
        ]
    }

    /// Treats image bytes as UTF-8 text so tests can "photograph" words.
    struct CaptionEmbedder;

    #[async_trait]
    impl Embedder for CaptionEmbedder {
        fn model_id(&self) -> String {
            "caption-test".to_string()
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|t| keyword_vector(t)).collect())
        }

        async fn embed_image(&self, image: &[u8]) -> Result<Vec<f32>> {
            Ok(keyword_vector(&String::from_utf8_lossy(image)))
        }
    }

    #[tokio::test]
    async fn test_search_ranks_by_cosine() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentVectorStore::build(dir.path(), &corpus(), Arc::new(KeywordEmbedder::default()))
            .await
            .unwrap();
        assert_eq!(store.len(), 2);
        let results = store.search("ocean shark", 1).await.unwrap();
        assert_eq!(results[0].document.title, "Jaws");
    }

    #[tokio::test]
    async fn test_cache_reused_when_count_matches() {
        let dir = tempfile::tempdir().unwrap();
        let embedder = Arc::new(KeywordEmbedder::default());
        DocumentVectorStore::build(dir.path(), &corpus(), embedder.clone())
            .await
            .unwrap();
        DocumentVectorStore::load_or_build(dir.path(), &corpus(), embedder.clone())
            .await
            .unwrap();
        assert_eq!(*embedder.calls.lock(), 1);

        let mut grown = corpus();
        grown.push(Document {
            id: 4,
            title: "Toy Story".to_string(),
            description: "A toy comes alive.".to_string(),
        });
        let store = DocumentVectorStore::load_or_build(dir.path(), &grown, embedder.clone())
            .await
            .unwrap();
        assert_eq!(*embedder.calls.lock(), 2);
        assert_eq!(store.len(), 3);
    }

    #[tokio::test]
    async fn test_image_search() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentVectorStore::build(dir.path(), &corpus(), Arc::new(CaptionEmbedder))
            .await
            .unwrap();
        let results = store.search_with_image(b"a bear", 5).await.unwrap();
        assert_eq!(results[0].document.title, "Paddington");
    }

    #[tokio::test]
    async fn test_image_search_unsupported_by_text_embedder() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentVectorStore::build(dir.path(), &corpus(), Arc::new(KeywordEmbedder::default()))
            .await
            .unwrap();
        let err = store.search_with_image(b"pixels", 5).await.unwrap_err();
        assert!(matches!(err, SearchError::EmbeddingUnavailable(_)));
    }
}
