use crate::config::AppState;
use crate::download::{public_service, uploads_service};
use crate::upload::{upload_files, upload_videos, FILES_LIMITS, VIDEOS_LIMITS};
use axum::{
    extract::DefaultBodyLimit,
    http::Method,
    routing::{get, post},
    Router,
};
use std::path::Path;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub fn create_routes(state: AppState, public_dir: &Path) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    let uploads = uploads_service(state.storage.root());

    Router::new()
        .route(
            "/api/upload/files",
            post(upload_files).layer(DefaultBodyLimit::max(FILES_LIMITS.max_body_bytes())),
        )
        .route(
            "/api/upload/videos",
            post(upload_videos).layer(DefaultBodyLimit::max(VIDEOS_LIMITS.max_body_bytes())),
        )
        .route("/api/health", get(|| async { "OK" }))
        .nest_service("/uploads", uploads)
        .fallback_service(public_service(public_dir))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
