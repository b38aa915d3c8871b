pub mod handlers;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::analyzer::SentimentAnalyzer;
use crate::config::ConfigSummary;

/// Shared state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub analyzer: Arc<SentimentAnalyzer>,
    pub config: Arc<ConfigSummary>,
}

/// Create and configure the API router
pub fn create_router(analyzer: SentimentAnalyzer, config: ConfigSummary) -> Router {
    let state = ApiState {
        analyzer: Arc::new(analyzer),
        config: Arc::new(config),
    };

    // Configure CORS to allow all origins (adjust for production)
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/analyze", post(handlers::analyze_sentiment))
        .route("/api/batch", post(handlers::batch_analyze))
        .fallback(handlers::not_found)
        .layer(cors)
        .with_state(state)
}
