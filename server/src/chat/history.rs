//! REST endpoint for paginated chat history between two users.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::auth::middleware::AuthenticatedUser;
use crate::chat::message::ChatMessage;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub from: Option<String>,
    pub to: Option<String>,
    pub offset: Option<u32>,
}

/// GET /messages?from={user}&to={user}&offset={n}
/// Returns one page of the conversation in chronological order.
/// The caller must be one of the two participants.
pub async fn get_messages(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<ChatMessage>>, StatusCode> {
    let from = query.from.filter(|s| !s.is_empty()).ok_or(StatusCode::BAD_REQUEST)?;
    let to = query.to.filter(|s| !s.is_empty()).ok_or(StatusCode::BAD_REQUEST)?;
    if caller != from && caller != to {
        return Err(StatusCode::FORBIDDEN);
    }

    let offset = query.offset.unwrap_or(0);
    let limit = state.history_page_size;
    let store = state.store.clone();

    let messages = tokio::task::spawn_blocking(move || store.history(&from, &to, offset, limit))
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to load chat history");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    Ok(Json(messages))
}
