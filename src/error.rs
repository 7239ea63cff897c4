use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, SearchError>;

/// Failures surfaced by the retrieval core.
///
/// Collaborator failures (`EmbeddingUnavailable`, `GenerationFailure`,
/// `CrossEncoderFailure`, `InvalidResponse`) are either propagated or
/// logged and degraded at the call site; see [`SearchError::is_collaborator`].
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("index artifact not found: {}", .0.display())]
    IndexNotFound(PathBuf),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("embedding unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("text generation failed: {0}")]
    GenerationFailure(String),

    #[error("cross-encoder failed: {0}")]
    CrossEncoderFailure(String),

    #[error("unparseable collaborator response: {0}")]
    InvalidResponse(String),

    #[error("corpus error: {0}")]
    Corpus(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("binary serialization error: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SearchError {
    /// True for errors raised by an external service rather than local state.
    pub fn is_collaborator(&self) -> bool {
        matches!(
            self,
            SearchError::EmbeddingUnavailable(_)
                | SearchError::GenerationFailure(_)
                | SearchError::CrossEncoderFailure(_)
                | SearchError::InvalidResponse(_)
        )
    }
}
