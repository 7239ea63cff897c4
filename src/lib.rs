//! # movie-search
//!
//! Hybrid movie retrieval: a BM25 inverted index and a chunk-level vector
//! index, merged by rank fusion and optionally refined by generative
//! re-ranking.
//!
//! ## Architecture
//!
//! ```text
//!                          ┌─────────────┐
//!                          │  User Query  │
//!                          └──────┬───────┘
//!                                 │
//!                                 ▼
//!                  ┌─────────────────────────────┐
//!                  │  Query Enhancement (opt.)    │
//!                  │  spell | rewrite | expand    │
//!                  │  failure → original query    │
//!                  └──────────────┬──────────────┘
//!                                 │
//!                    ┌────────────┴────────────┐
//!                    ▼                         ▼
//!           ┌────────────────┐       ┌──────────────────┐
//!           │ BM25 inverted  │       │ Chunk vectors    │
//!           │ index          │       │ max-pooled per   │
//!           │ limit × 500    │       │ document         │
//!           └───────┬────────┘       └────────┬─────────┘
//!                   │                         │
//!                   └────────────┬────────────┘
//!                                │
//!               ┌────────────────┴────────────────┐
//!               ▼                                 ▼
//!   ┌───────────────────────┐        ┌───────────────────────┐
//!   │  Weighted fusion      │        │  RRF fusion           │
//!   │  min-max normalize    │        │  Σ 1/(k + rank)       │
//!   │  α·bm25 + (1-α)·sem   │        │  keep limit × 5       │
//!   └───────────┬───────────┘        └───────────┬───────────┘
//!               │                                │
//!               │                                ▼
//!               │                   ┌───────────────────────┐
//!               │                   │  Re-ranking (opt.)    │
//!               │                   │  pointwise | listwise │
//!               │                   │  | cross-encoder      │
//!               │                   └───────────┬───────────┘
//!               │                               │
//!               │                               ▼
//!               │                   ┌───────────────────────┐
//!               │                   │  Truncate to limit    │
//!               │                   │  0-3 evaluation (opt.)│
//!               │                   └───────────┬───────────┘
//!               ▼                               ▼
//!                  ┌───────────────────────┐
//!                  │   Final Results       │
//!                  └───────────────────────┘
//! ```
//!
//! ## Module Overview
//!
//! - [`config`] - Environment-based configuration for paths, server and model providers
//! - [`corpus`] - Movie corpus and golden dataset loading
//! - [`text`] - Tokenizer: case-folding, punctuation stripping, stopword removal
//! - [`chunking`] - Overlapping sentence windows and fixed-size word windows
//! - [`search::bm25`] - Inverted index with TF-IDF / BM25 scoring and persistence
//! - [`search::vector`] - Chunk vector store with checksum-validated cache
//! - [`search::semantic`] - Whole-document vector store and image search
//! - [`search::hybrid`] - Weighted and reciprocal rank fusion, the search pipeline
//! - [`llm`] - Embedder / Generator / CrossEncoder traits and HTTP providers
//! - [`llm::enhance`] - Spell-fix, rewrite and expansion of queries
//! - [`llm::rerank`] - Pointwise, listwise and cross-encoder re-ranking
//! - [`llm::answer`] - Retrieval-augmented answers
//! - [`evaluation`] - Precision / recall / F1 against labelled queries
//! - [`api`] - Axum HTTP handlers
//! - [`state`] - Shared application state holding indexes and collaborators

pub mod api;
pub mod chunking;
pub mod config;
pub mod corpus;
pub mod error;
pub mod evaluation;
pub mod llm;
pub mod models;
pub mod persist;
pub mod search;
pub mod state;
pub mod text;

pub use error::{Result, SearchError};
