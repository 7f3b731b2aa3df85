pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::dossier::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let max_upload_bytes = state.max_upload_bytes;

    Router::new()
        .route("/health", get(health::health_handler))
        // Extraction API
        .route("/api/v1/extract", post(handlers::handle_extract))
        .route(
            "/api/v1/extract/photo",
            post(handlers::handle_extract_photo),
        )
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}
