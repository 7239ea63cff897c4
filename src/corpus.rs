//! Loading of the movie corpus and the golden evaluation dataset.

use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

use crate::error::{Result, SearchError};
use crate::models::{Document, GoldenCase};

#[derive(Deserialize)]
struct MoviesFile {
    movies: Vec<Document>,
}

#[derive(Deserialize)]
struct GoldenFile {
    test_cases: Vec<GoldenCase>,
}

/// Read `{ "movies": [...] }` from `path`. Ids must be unique.
pub fn load_movies(path: &Path) -> Result<Vec<Document>> {
    let data = std::fs::read_to_string(path).map_err(|e| {
        SearchError::Corpus(format!("failed to read {}: {e}", path.display()))
    })?;
    parse_movies(&data)
}

pub fn parse_movies(data: &str) -> Result<Vec<Document>> {
    let file: MoviesFile = serde_json::from_str(data)
        .map_err(|e| SearchError::Corpus(format!("invalid movies JSON: {e}")))?;

    let mut seen = HashSet::new();
    for doc in &file.movies {
        if !seen.insert(doc.id) {
            return Err(SearchError::Corpus(format!("duplicate document id {}", doc.id)));
        }
    }

    Ok(file.movies)
}

/// Read `{ "test_cases": [...] }` from `path`.
pub fn load_golden_dataset(path: &Path) -> Result<Vec<GoldenCase>> {
    let data = std::fs::read_to_string(path).map_err(|e| {
        SearchError::Corpus(format!("failed to read {}: {e}", path.display()))
    })?;
    let file: GoldenFile = serde_json::from_str(&data)
        .map_err(|e| SearchError::Corpus(format!("invalid golden dataset JSON: {e}")))?;
    Ok(file.test_cases)
}
