use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

pub mod handlers;
pub mod state;

pub use state::AppState;

/// Read path only: the API never mutates clustering state.
pub async fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::permissive();

    Router::new()
        .route("/api/stories", get(handlers::list_stories))
        .route("/api/stories/:id", get(handlers::get_story))
        .route("/api/stories/:id/coverage", get(handlers::get_story_coverage))
        .route("/api/blindspots", get(handlers::list_blindspots))
        .layer(cors)
        .with_state(Arc::new(state))
}

pub mod prelude {
    pub use crate::AppState;
    pub use nb_core::{NewsStore, Result};
}
