//! In-memory registry of live chat connections, keyed by username.
//!
//! A user may hold several sessions at once (one per open tab). Every
//! operation runs under a single lock so callers never observe a half
//! updated map, and lookups copy handles out so no network write ever
//! happens while the lock is held.

use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use uuid::Uuid;

use super::ConnectionSender;

/// Identifier of one live connection, generated at register time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(Uuid);

impl SessionId {
    fn generate() -> Self {
        Self(Uuid::now_v7())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A live connection bound to an authenticated user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: SessionId,
    pub username: String,
}

/// Copy of a registered connection handed out for fan-out.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub id: SessionId,
    pub username: String,
    pub sender: ConnectionSender,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("username must not be empty")]
    EmptyUsername,
    #[error("connection handle is already closed")]
    ClosedHandle,
}

/// Broken registry invariant. Only reachable through a locking bug.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("registry invariant violated: {0}")]
pub struct RegistryInvariantViolation(pub String);

#[derive(Default)]
struct RegistryState {
    /// username -> (session id -> handle). A key exists only while it has sessions.
    by_user: HashMap<String, HashMap<SessionId, ConnectionSender>>,
    /// Reverse index so unregister only needs the session id.
    owners: HashMap<SessionId, String>,
}

/// Thread-safe username -> sessions mapping.
#[derive(Default)]
pub struct ConnectionRegistry {
    state: RwLock<RegistryState>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection for `username` and return its new session.
    pub fn register(
        &self,
        username: &str,
        sender: ConnectionSender,
    ) -> Result<Session, RegistryError> {
        if username.is_empty() {
            return Err(RegistryError::EmptyUsername);
        }
        if sender.is_closed() {
            return Err(RegistryError::ClosedHandle);
        }

        let mut state = self.state.write();
        let mut id = SessionId::generate();
        while state.owners.contains_key(&id) {
            id = SessionId::generate();
        }
        state.owners.insert(id, username.to_string());
        let sessions = state.by_user.entry(username.to_string()).or_default();
        sessions.insert(id, sender);
        let count = sessions.len();
        drop(state);

        tracing::debug!(
            username = %username,
            session_id = %id,
            connections = count,
            "Connection registered"
        );

        Ok(Session {
            id,
            username: username.to_string(),
        })
    }

    /// Remove a session. Unknown ids are ignored so shutdown paths may race
    /// explicit disconnects. Returns the owning username when something was
    /// removed.
    pub fn unregister(&self, id: SessionId) -> Option<String> {
        let mut state = self.state.write();
        let username = state.owners.remove(&id)?;

        let now_empty = match state.by_user.get_mut(&username) {
            Some(sessions) => {
                sessions.remove(&id);
                sessions.is_empty()
            }
            None => false,
        };
        if now_empty {
            state.by_user.remove(&username);
        }
        drop(state);

        tracing::debug!(
            username = %username,
            session_id = %id,
            last_session = now_empty,
            "Connection unregistered"
        );

        Some(username)
    }

    /// Snapshot of the sessions currently held by `username`.
    pub fn sessions_for(&self, username: &str) -> Vec<SessionHandle> {
        let state = self.state.read();
        state
            .by_user
            .get(username)
            .map(|sessions| {
                sessions
                    .iter()
                    .map(|(id, sender)| SessionHandle {
                        id: *id,
                        username: username.to_string(),
                        sender: sender.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Snapshot of every registered session across all users.
    pub fn all_sessions(&self) -> Vec<SessionHandle> {
        let state = self.state.read();
        state
            .by_user
            .iter()
            .flat_map(|(username, sessions)| {
                sessions.iter().map(move |(id, sender)| SessionHandle {
                    id: *id,
                    username: username.clone(),
                    sender: sender.clone(),
                })
            })
            .collect()
    }

    /// Usernames with at least one live session.
    pub fn usernames(&self) -> BTreeSet<String> {
        self.state.read().by_user.keys().cloned().collect()
    }

    pub fn is_online(&self, username: &str) -> bool {
        self.state.read().by_user.contains_key(username)
    }

    pub fn session_count(&self) -> usize {
        self.state.read().owners.len()
    }

    /// Cross-check the forward map against the reverse index.
    pub fn verify_invariants(&self) -> Result<(), RegistryInvariantViolation> {
        let state = self.state.read();
        let mut seen = 0usize;

        for (username, sessions) in &state.by_user {
            if sessions.is_empty() {
                return Err(RegistryInvariantViolation(format!(
                    "username {username:?} has an empty session set"
                )));
            }
            for id in sessions.keys() {
                match state.owners.get(id) {
                    Some(owner) if owner == username => seen += 1,
                    Some(owner) => {
                        return Err(RegistryInvariantViolation(format!(
                            "session {id} listed under {username:?} but owned by {owner:?}"
                        )))
                    }
                    None => {
                        return Err(RegistryInvariantViolation(format!(
                            "session {id} under {username:?} missing from owner index"
                        )))
                    }
                }
            }
        }

        if seen != state.owners.len() {
            return Err(RegistryInvariantViolation(format!(
                "{} sessions indexed but {seen} present in user buckets",
                state.owners.len()
            )));
        }
        Ok(())
    }
}
