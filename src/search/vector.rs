use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::chunking::ChunkConfig;
use crate::error::{Result, SearchError};
use crate::llm::Embedder;
use crate::models::{Document, ScoredDocument, PREVIEW_CHARS};
use crate::persist;

pub const CHUNK_EMBEDDINGS_FILE: &str = "chunk_embeddings.bin";
pub const CHUNK_METADATA_FILE: &str = "chunk_metadata.json";

/// Decimal places kept on semantic scores.
const SCORE_DECIMALS: i32 = 4;

/// Where a chunk came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Position of the source document in the corpus slice given at build time.
    pub document_index: usize,
    pub chunk_index: usize,
    pub total_chunks: usize,
}

/// Contents of `chunk_metadata.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChunkCache {
    chunks: Vec<ChunkMetadata>,
    total_chunks: usize,
    /// Sum of description lengths (chars) of the indexed documents.
    description_len: usize,
    /// blake3 over every indexed document's id and description.
    corpus_hash: String,
    model_id: String,
    built_at: DateTime<Utc>,
}

/// What a cache must match to be reused.
#[derive(Debug, Clone, PartialEq, Eq)]
struct CorpusFingerprint {
    description_len: usize,
    corpus_hash: String,
}

impl CorpusFingerprint {
    fn of(documents: &[Document]) -> Self {
        let mut hasher = blake3::Hasher::new();
        let mut description_len = 0;
        for doc in documents.iter().filter(|d| is_indexable(d)) {
            description_len += doc.description.chars().count();
            hasher.update(&doc.id.to_le_bytes());
            hasher.update(doc.description.as_bytes());
            hasher.update(&[0]);
        }
        Self {
            description_len,
            corpus_hash: hasher.finalize().to_hex().to_string(),
        }
    }
}

fn is_indexable(doc: &Document) -> bool {
    !doc.description.trim().is_empty()
}

/// Chunk-level vector index with a checksum-validated on-disk cache.
///
/// Each document with a description is split into overlapping sentence
/// windows; every window gets its own vector. A query scores a document by
/// its best-matching chunk.
pub struct ChunkVectorStore {
    dir: PathBuf,
    documents: Vec<Document>,
    embeddings: Vec<Vec<f32>>,
    metadata: Vec<ChunkMetadata>,
    embedder: Arc<dyn Embedder>,
}

impl ChunkVectorStore {
    /// Chunk and embed `documents`, then persist vectors and metadata under `dir`.
    pub async fn build(
        dir: &Path,
        documents: Vec<Document>,
        embedder: Arc<dyn Embedder>,
        chunking: ChunkConfig,
    ) -> Result<Self> {
        let mut texts = Vec::new();
        let mut metadata = Vec::new();

        for (document_index, doc) in documents.iter().enumerate() {
            if !is_indexable(doc) {
                continue;
            }
            let chunks = chunking.chunk(&doc.description);
            let total_chunks = chunks.len();
            for (chunk_index, chunk) in chunks.into_iter().enumerate() {
                texts.push(chunk);
                metadata.push(ChunkMetadata {
                    document_index,
                    chunk_index,
                    total_chunks,
                });
            }
        }

        tracing::info!(
            "Embedding {} chunks from {} documents",
            texts.len(),
            documents.len()
        );

        let embeddings = if texts.is_empty() {
            Vec::new()
        } else {
            embedder.embed_batch(&texts).await?
        };
        if embeddings.len() != metadata.len() {
            return Err(SearchError::EmbeddingUnavailable(format!(
                "expected {} chunk embeddings, got {}",
                metadata.len(),
                embeddings.len()
            )));
        }

        let fingerprint = CorpusFingerprint::of(&documents);
        let cache = ChunkCache {
            total_chunks: metadata.len(),
            chunks: metadata.clone(),
            description_len: fingerprint.description_len,
            corpus_hash: fingerprint.corpus_hash,
            model_id: embedder.model_id(),
            built_at: Utc::now(),
        };

        persist::save_bincode(&dir.join(CHUNK_EMBEDDINGS_FILE), &embeddings)?;
        persist::save_json(&dir.join(CHUNK_METADATA_FILE), &cache)?;

        Ok(Self {
            dir: dir.to_path_buf(),
            documents,
            embeddings,
            metadata,
            embedder,
        })
    }

    /// Reuse the cache under `dir` when it matches `documents` and the
    /// embedder, otherwise rebuild it.
    pub async fn load_or_build(
        dir: &Path,
        documents: Vec<Document>,
        embedder: Arc<dyn Embedder>,
        chunking: ChunkConfig,
    ) -> Result<Self> {
        match Self::load_cached(dir, &documents, embedder.model_id().as_str()) {
            Ok(Some((embeddings, metadata))) => {
                tracing::info!("Loaded {} cached chunk embeddings", embeddings.len());
                return Ok(Self {
                    dir: dir.to_path_buf(),
                    documents,
                    embeddings,
                    metadata,
                    embedder,
                });
            }
            Ok(None) => tracing::info!("Chunk embedding cache is stale, rebuilding"),
            Err(SearchError::IndexNotFound(path)) => {
                tracing::info!("No chunk embedding cache at {}, building", path.display())
            }
            Err(e) => tracing::warn!("Unreadable chunk embedding cache, rebuilding: {e}"),
        }

        Self::build(dir, documents, embedder, chunking).await
    }

    /// `Ok(None)` when the cache exists but belongs to a different corpus or model.
    fn load_cached(
        dir: &Path,
        documents: &[Document],
        model_id: &str,
    ) -> Result<Option<(Vec<Vec<f32>>, Vec<ChunkMetadata>)>> {
        let cache: ChunkCache = persist::load_json(&dir.join(CHUNK_METADATA_FILE))?;
        let embeddings: Vec<Vec<f32>> = persist::load_bincode(&dir.join(CHUNK_EMBEDDINGS_FILE))?;

        let expected = CorpusFingerprint::of(documents);
        if cache.description_len != expected.description_len {
            tracing::debug!(
                "Description checksum {} != {}",
                cache.description_len,
                expected.description_len
            );
            return Ok(None);
        }
        if cache.corpus_hash != expected.corpus_hash || cache.model_id != model_id {
            return Ok(None);
        }
        if embeddings.len() != cache.chunks.len() || cache.total_chunks != cache.chunks.len() {
            return Ok(None);
        }
        if cache.chunks.iter().any(|c| c.document_index >= documents.len()) {
            return Ok(None);
        }

        Ok(Some((embeddings, cache.chunks)))
    }

    /// Top `limit` documents by best chunk cosine similarity, descriptions
    /// cut to the preview length and scores rounded to four decimals.
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<ScoredDocument>> {
        let mut results = self.search_full_text(query, limit).await?;
        for r in &mut results {
            r.document = r.document.preview(PREVIEW_CHARS);
        }
        Ok(results)
    }

    /// Same ranking as [`search`](Self::search) with descriptions left whole,
    /// for stages that still read the document text.
    pub async fn search_full_text(&self, query: &str, limit: usize) -> Result<Vec<ScoredDocument>> {
        let query_embedding = self.embedder.embed(query).await?;

        // Max-pool per document, remembering first-seen order for ties.
        let mut best: HashMap<usize, f32> = HashMap::new();
        let mut order: Vec<usize> = Vec::new();
        for (embedding, meta) in self.embeddings.iter().zip(&self.metadata) {
            let score = cosine_similarity(&query_embedding, embedding);
            match best.get_mut(&meta.document_index) {
                Some(current) if score > *current => *current = score,
                Some(_) => {}
                None => {
                    best.insert(meta.document_index, score);
                    order.push(meta.document_index);
                }
            }
        }

        let mut scored: Vec<(usize, f32)> = order.into_iter().map(|i| (i, best[&i])).collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);

        Ok(scored
            .into_iter()
            .filter_map(|(index, score)| {
                self.documents.get(index).map(|doc| ScoredDocument {
                    document: doc.clone(),
                    score: round_score(score),
                })
            })
            .collect())
    }

    /// Number of stored chunks.
    pub fn len(&self) -> usize {
        self.embeddings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.embeddings.is_empty()
    }

    pub fn metadata(&self) -> &[ChunkMetadata] {
        &self.metadata
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

fn round_score(score: f32) -> f32 {
    let factor = 10f32.powi(SCORE_DECIMALS);
    (score * factor).round() / factor
}

/// Cosine similarity; 0 when either vector has zero norm or lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for i in 0..a.len() {
        dot += a[i] * b[i];
        norm_a += a[i] * a[i];
        norm_b += b[i] * b[i];
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}
