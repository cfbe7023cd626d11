//! Axum router — maps URL paths to handlers.

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    services::ServeDir,
    cors::CorsLayer,
    trace::TraceLayer,
    compression::CompressionLayer,
};
use std::path::Path;
use std::sync::Arc;
use crate::state::{AppState, SharedState};
use crate::handlers::{
    health::health,
    query::query_submit,
};

/// Build and return the full Axum router.
pub fn build_router(state: AppState, static_dir: impl AsRef<Path>) -> Router {
    let shared: SharedState = Arc::new(state);

    Router::new()
        .route("/query",  post(query_submit))
        .route("/health", get(health))

        // Everything else is a static asset
        .fallback_service(ServeDir::new(static_dir.as_ref()))

        // Middleware
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(shared)
}
