//! API route definitions

use axum::{
    extract::{DefaultBodyLimit, Extension},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use utdrs_observability::routes::monitoring_routes;

use crate::handlers::*;

/// Create the main API router
pub fn create_router(state: Arc<AppState>) -> Router {
    let monitoring = monitoring_routes(state.monitoring.clone());
    let dashboard = ServeDir::new(&state.config.static_dir);
    let body_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))

        // Detection routes
        .route("/api/analyze", post(analyze))
        .route("/api/sample-data/:data_type", get(sample_data))
        .route("/api/rules", get(list_rules))

        // Monitoring routes
        .nest("/monitoring", monitoring)

        // Static dashboard
        .nest_service("/dashboard", dashboard)

        // Apply middleware
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(Extension(state))
}
