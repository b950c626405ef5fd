//! API module for handling HTTP requests and responses

pub mod handlers;
pub mod responses;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::state::AppState;

pub use handlers::*;

// Room for multipart framing and base64 expansion on top of the file limit
const BODY_OVERHEAD: usize = 1024 * 1024;

/// Create the application router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let body_limit = state.config.max_upload_size * 4 / 3 + BODY_OVERHEAD;

    Router::new()
        .route("/api/health", get(health_check))
        .route("/analyze-similarity", post(analyze_similarity))
        .route("/analyze-emotion-realtime", post(analyze_emotion_realtime))
        .route("/generate-practice-report", post(generate_practice_report))
        .route("/save-best-frame", post(save_best_frame))
        .nest_service("/static", ServeDir::new(&state.config.static_dir))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .with_state(state)
}
