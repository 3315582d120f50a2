use axum::{extract::State, http::StatusCode, Json};
use axum_extra::extract::{cookie::Cookie, CookieJar};
use chrono::{Duration, Utc};
use rusqlite::OptionalExtension;
use serde::Serialize;

use super::middleware::AuthenticatedUser;
use super::{AuthError, SessionAuthenticator};
use crate::chat::message::format_timestamp;
use crate::db::DbPool;
use crate::state::AppState;

/// Looks tokens up in the `sessions` table, ignoring expired rows.
#[derive(Clone)]
pub struct SqliteSessionAuthenticator {
    db: DbPool,
}

impl SqliteSessionAuthenticator {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }
}

impl SessionAuthenticator for SqliteSessionAuthenticator {
    fn authenticate(&self, token: &str) -> Result<String, AuthError> {
        if token.is_empty() {
            return Err(AuthError::MissingCredential);
        }
        let conn = self
            .db
            .lock()
            .map_err(|_| AuthError::Backend("database lock poisoned".into()))?;
        conn.query_row(
            "SELECT nickname FROM sessions WHERE session_id = ?1 AND expires_at > ?2",
            rusqlite::params![token, format_timestamp(&Utc::now())],
            |row| row.get::<_, String>(0),
        )
        .optional()
        .map_err(|e| AuthError::Backend(e.to_string()))?
        .ok_or(AuthError::InvalidCredential)
    }
}

/// Issue a session token for `username` that expires after `ttl`.
pub fn create_session(db: &DbPool, username: &str, ttl: Duration) -> Result<String, AuthError> {
    let token = uuid::Uuid::now_v7().to_string();
    let expires_at = format_timestamp(&(Utc::now() + ttl));
    let conn = db
        .lock()
        .map_err(|_| AuthError::Backend("database lock poisoned".into()))?;
    conn.execute(
        "INSERT INTO sessions (session_id, nickname, expires_at) VALUES (?1, ?2, ?3)",
        rusqlite::params![token, username, expires_at],
    )
    .map_err(|e| AuthError::Backend(e.to_string()))?;
    Ok(token)
}

/// Drop a session so its token no longer authenticates.
pub fn revoke_session(db: &DbPool, token: &str) -> Result<bool, AuthError> {
    let conn = db
        .lock()
        .map_err(|_| AuthError::Backend("database lock poisoned".into()))?;
    let removed = conn
        .execute(
            "DELETE FROM sessions WHERE session_id = ?1",
            rusqlite::params![token],
        )
        .map_err(|e| AuthError::Backend(e.to_string()))?;
    Ok(removed > 0)
}

#[derive(Debug, Serialize)]
pub struct LoggedResponse {
    pub username: String,
}

/// GET /logged -- Who the session cookie belongs to. 401 without a valid session.
pub async fn logged(AuthenticatedUser(username): AuthenticatedUser) -> Json<LoggedResponse> {
    Json(LoggedResponse { username })
}

/// POST /logout -- Revoke the caller's session and clear its cookie.
/// 400 when the request carries no session cookie.
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, StatusCode), StatusCode> {
    let token = jar
        .get(&state.session_cookie)
        .map(|cookie| cookie.value().to_string())
        .filter(|token| !token.is_empty())
        .ok_or(StatusCode::BAD_REQUEST)?;

    let db = state.db.clone();
    let revoked = tokio::task::spawn_blocking(move || revoke_session(&db, &token))
        .await
        .map_err(|e| AuthError::Backend(e.to_string()))
        .and_then(|result| result)
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to revoke session");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
    tracing::debug!(revoked, "Logout");

    let jar = jar.remove(Cookie::build(state.session_cookie.clone()).path("/"));
    Ok((jar, StatusCode::NO_CONTENT))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_session_resolves_username() {
        let db = crate::db::init_in_memory().unwrap();
        let token = create_session(&db, "alice", Duration::hours(24)).unwrap();
        let auth = SqliteSessionAuthenticator::new(db);
        assert_eq!(auth.authenticate(&token).unwrap(), "alice");
    }

    #[test]
    fn test_expired_session_is_rejected() {
        let db = crate::db::init_in_memory().unwrap();
        let token = create_session(&db, "alice", Duration::seconds(-5)).unwrap();
        let auth = SqliteSessionAuthenticator::new(db);
        assert_eq!(auth.authenticate(&token), Err(AuthError::InvalidCredential));
    }

    #[test]
    fn test_unknown_and_missing_tokens() {
        let db = crate::db::init_in_memory().unwrap();
        let auth = SqliteSessionAuthenticator::new(db);
        assert_eq!(auth.authenticate("nope"), Err(AuthError::InvalidCredential));
        assert_eq!(auth.authenticate(""), Err(AuthError::MissingCredential));
    }

    #[test]
    fn test_revoked_session_is_rejected() {
        let db = crate::db::init_in_memory().unwrap();
        let token = create_session(&db, "bob", Duration::hours(1)).unwrap();
        assert!(revoke_session(&db, &token).unwrap());
        let auth = SqliteSessionAuthenticator::new(db);
        assert_eq!(auth.authenticate(&token), Err(AuthError::InvalidCredential));
    }
}
