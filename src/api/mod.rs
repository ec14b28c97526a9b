//! HTTP surface over the two checks

pub(crate) mod handlers;
pub(crate) mod responses;

use axum::{
    extract::{DefaultBodyLimit, State},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::state::{AppState, ServerConfig};

pub use handlers::{verify_embedding, verify_sharpness};
pub use responses::ApiResponse;

/// Create the application router with all routes
pub fn create_router(config: &ServerConfig) -> Router<Arc<AppState>> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/verify/embedding", post(verify_embedding))
        .route("/api/verify/sharpness", post(verify_sharpness))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(cors)
}

/// Health check endpoint
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "embedding_model": state.embedder.is_some(),
    }))
}
