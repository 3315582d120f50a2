use axum::{
    extract::{FromRequestParts, Query},
    http::{request::Parts, StatusCode},
};
use axum_extra::extract::CookieJar;
use serde::Deserialize;

use super::AuthError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// Pull the session token from the session cookie, falling back to a
/// `token` query parameter (browsers cannot set headers on WebSocket
/// upgrades made from scripts).
pub fn session_token(parts: &Parts, cookie_name: &str) -> Option<String> {
    let jar = CookieJar::from_headers(&parts.headers);
    if let Some(cookie) = jar.get(cookie_name) {
        if !cookie.value().is_empty() {
            return Some(cookie.value().to_string());
        }
    }
    Query::<TokenQuery>::try_from_uri(&parts.uri)
        .ok()
        .and_then(|Query(query)| query.token)
        .filter(|token| !token.is_empty())
}

/// Resolve request credentials to a username off the async runtime.
pub async fn authenticate_parts(parts: &Parts, state: &AppState) -> Result<String, AuthError> {
    let token = session_token(parts, &state.session_cookie).ok_or(AuthError::MissingCredential)?;
    let authenticator = state.authenticator.clone();
    tokio::task::spawn_blocking(move || authenticator.authenticate(&token))
        .await
        .map_err(|e| AuthError::Backend(e.to_string()))?
}

/// Username of the caller's session.
/// Implements axum's FromRequestParts for use as an extractor.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub String);

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = StatusCode;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match authenticate_parts(parts, state).await {
            Ok(username) => Ok(AuthenticatedUser(username)),
            Err(AuthError::Backend(e)) => {
                tracing::error!(error = %e, "Session lookup failed");
                Err(StatusCode::INTERNAL_SERVER_ERROR)
            }
            Err(e) => {
                tracing::debug!(error = %e, "Rejected unauthenticated request");
                Err(StatusCode::UNAUTHORIZED)
            }
        }
    }
}
