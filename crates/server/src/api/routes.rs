use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use super::middleware::metrics_middleware;
use super::{convert, handlers, media};
use crate::state::AppState;

/// Headroom for multipart framing and text fields above the file limit.
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

pub fn create_router(state: Arc<AppState>) -> Router {
    let storage = &state.config().storage;
    let body_limit = usize::try_from(storage.max_upload_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);
    let output_dir = storage.output_dir.clone();

    // API routes
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Conversion
        .route("/convert", post(convert::convert))
        .route("/convert/progress/{id}", get(convert::progress))
        // Inspection
        .route("/metadata", post(media::metadata))
        .route("/thumbnail", post(media::thumbnail));

    Router::new()
        .nest("/api", api_routes)
        .route("/metrics", get(handlers::metrics))
        .nest_service("/output", ServeDir::new(output_dir))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
