//! REST API: router, handlers, DTOs, and error mapping.

pub mod errors;
pub mod handlers;
pub mod models;

use axum::routing::{get, post};
use axum::Router;
use handlers::AppState;
use tower_http::cors::CorsLayer;

/// Build the application router. CORS is permissive: the facade is meant to
/// sit behind a local front-end during development.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/search", get(handlers::search))
        .route("/autocomplete", get(handlers::autocomplete))
        .route("/similar", get(handlers::similar))
        .route("/documents", post(handlers::upload_document))
        .route("/health", get(handlers::health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
