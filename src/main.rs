use axum::routing::{get, post};
use axum::Router;
use tracing_subscriber::EnvFilter;

use movie_search::api;
use movie_search::config::Config;
use movie_search::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    tracing::info!("Corpus: {}", config.movies_path().display());
    tracing::info!("Cache directory: {}", config.cache_dir.display());
    tracing::info!("LLM provider: {} ({})", config.llm.provider, config.llm.base_url);

    let state = AppState::new(config.clone())?;

    let app = Router::new()
        .route("/api/health", get(api::index::health))
        .route("/api/index/build", post(api::index::build_index))
        .route("/api/index/vectors", post(api::index::build_vectors))
        .route("/api/keyword/search", post(api::keyword::keyword_search))
        .route("/api/keyword/bm25", post(api::keyword::bm25_search))
        .route("/api/keyword/stats", post(api::keyword::term_stats))
        .route("/api/normalize", post(api::keyword::normalize_scores))
        .route("/api/chunk", post(api::keyword::chunk_text))
        .route("/api/semantic/search", post(api::search::semantic_search))
        .route("/api/semantic/document", post(api::search::document_search))
        .route("/api/semantic/image", post(api::search::image_search))
        .route("/api/search/weighted", post(api::search::weighted_search))
        .route("/api/search/rrf", post(api::search::rrf_search))
        .route("/api/answer", post(api::rag::answer_query))
        .route("/api/evaluate", post(api::rag::evaluate))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
