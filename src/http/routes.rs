use super::handlers;
use super::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Largest accepted upload body (audio files and images)
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    let files = ServeDir::new(&state.files_dir);

    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Session lifecycle
        .route("/sessions", post(handlers::create_session))
        .route(
            "/sessions/:session_id",
            get(handlers::get_session).delete(handlers::close_session),
        )
        // Recorder control
        .route("/sessions/:session_id/capture/start", post(handlers::start_capture))
        .route("/sessions/:session_id/capture/stop", post(handlers::stop_capture))
        .route("/sessions/:session_id/file", post(handlers::supply_file))
        .route("/sessions/:session_id/play", post(handlers::play))
        .route("/sessions/:session_id/pause", post(handlers::pause))
        .route("/sessions/:session_id/discard", post(handlers::discard))
        .route("/sessions/:session_id/description", put(handlers::set_description))
        // Story submission
        .route("/sessions/:session_id/images", post(handlers::add_image))
        .route("/sessions/:session_id/submit", post(handlers::submit_story))
        // Media
        .route("/blobs/:reference", get(handlers::get_blob))
        .nest_service("/files", files)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
