use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::auth::session;
use crate::chat::history;
use crate::state::AppState;
use crate::ws::handler as ws_handler;

/// Build the full axum Router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    // WebSocket endpoint (auth via session cookie or ?token=)
    let ws_routes = Router::new().route("/ws", get(ws_handler::ws_upgrade));

    let chat_routes = Router::new()
        .route("/messages", get(history::get_messages))
        .route("/logged", get(session::logged))
        .route("/logout", post(session::logout));

    let health = Router::new().route("/health", get(health_check));

    Router::new()
        .merge(ws_routes)
        .merge(chat_routes)
        .merge(health)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Basic health check endpoint
async fn health_check() -> &'static str {
    "ok"
}
