use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, WebSocketUpgrade},
        FromRequestParts, Request, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::auth::{middleware::authenticate_parts, AuthError};
use crate::state::AppState;
use crate::ws::actor;
use crate::ws::lifecycle::{ConnectionState, Lifecycle};

/// GET /ws
/// WebSocket upgrade endpoint. The session credential is checked before
/// the upgrade: a missing or invalid credential gets `401 Unauthorized`
/// and never touches the registry.
pub async fn ws_upgrade(State(state): State<AppState>, request: Request) -> Response {
    let (mut parts, _body) = request.into_parts();
    let mut lifecycle = Lifecycle::new();
    lifecycle.advance(ConnectionState::Authenticating);

    let username = match authenticate_parts(&parts, &state).await {
        Ok(username) => username,
        Err(err) => {
            lifecycle.advance(ConnectionState::Closed);
            return match err {
                AuthError::Backend(e) => {
                    tracing::error!(error = %e, "Session lookup failed during upgrade");
                    StatusCode::INTERNAL_SERVER_ERROR.into_response()
                }
                e => {
                    tracing::debug!(error = %e, "WebSocket auth failed");
                    StatusCode::UNAUTHORIZED.into_response()
                }
            };
        }
    };

    let ws = match WebSocketUpgrade::from_request_parts(&mut parts, &state).await {
        Ok(ws) => ws,
        Err(rejection) => {
            lifecycle.advance(ConnectionState::Closed);
            return upgrade_rejected(&username, rejection);
        }
    };

    tracing::info!(username = %username, "WebSocket connection authenticated");

    let failed_user = username.clone();
    ws.on_failed_upgrade(move |e| {
        tracing::warn!(username = %failed_user, error = %e, "WebSocket upgrade failed");
    })
    .on_upgrade(move |socket| actor::run_connection(socket, state, username, lifecycle))
}

fn upgrade_rejected(username: &str, rejection: WebSocketUpgradeRejection) -> Response {
    tracing::warn!(
        username = %username,
        error = %rejection,
        "WebSocket upgrade rejected"
    );
    rejection.into_response()
}
