use super::handler;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Create the router with the socket endpoint and HTTP surface
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handler::health_check))
        // Live interview socket
        .route("/ws", get(handler::interview_socket))
        // Video finalization
        .route(
            "/responses/:response_id/media/merge",
            post(handler::merge_video),
        )
        .layer(CorsLayer::permissive())
        // Request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
