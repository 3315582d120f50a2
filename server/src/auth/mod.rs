//! Session credential -> username resolution.

pub mod middleware;
pub mod session;

pub use session::SqliteSessionAuthenticator;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("no session credential presented")]
    MissingCredential,
    #[error("session credential is invalid or expired")]
    InvalidCredential,
    #[error("session lookup failed: {0}")]
    Backend(String),
}

/// Maps a session token to the username it was issued for.
///
/// Implementations may block; async callers go through `spawn_blocking`.
pub trait SessionAuthenticator: Send + Sync {
    fn authenticate(&self, token: &str) -> Result<String, AuthError>;
}
