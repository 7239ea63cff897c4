//! Axum handlers. Every handler returns `Result<Json<_>, (StatusCode, String)>`.

pub mod index;
pub mod keyword;
pub mod rag;
pub mod search;

use axum::http::StatusCode;

use crate::error::SearchError;

pub type ApiError = (StatusCode, String);

/// Map a core error onto an HTTP status.
pub fn error_response(err: SearchError) -> ApiError {
    let status = match &err {
        SearchError::InvalidQuery(_) => StatusCode::BAD_REQUEST,
        SearchError::IndexNotFound(_) => StatusCode::NOT_FOUND,
        e if e.is_collaborator() => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        tracing::error!("Request failed: {err}");
    }
    (status, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(
            error_response(SearchError::InvalidQuery("x".into())).0,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            error_response(SearchError::IndexNotFound("index.bin".into())).0,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            error_response(SearchError::CrossEncoderFailure("down".into())).0,
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            error_response(SearchError::Corpus("bad".into())).0,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
