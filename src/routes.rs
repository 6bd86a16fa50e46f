use axum::{routing::get, Router};
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::state::AppState;
use crate::ws::handler as ws_handler;

/// Build the axum Router: WebSocket endpoint, health check, and the static
/// page fallback (index.html at the service root plus assets).
pub fn build_router(state: AppState, static_dir: &str) -> Router {
    Router::new()
        .route("/ws", get(ws_handler::ws_upgrade))
        .route("/health", get(health_check))
        .fallback_service(ServeDir::new(static_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "ok"
}
