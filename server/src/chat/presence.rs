//! Server-side presence: which usernames currently hold a live session.
//!
//! The list is recomputed from the registry on every change and pushed to
//! every connection as a `user_list` frame.

use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::ws::broadcast::{send_to_sessions, FanoutReport};
use crate::ws::protocol::{encode, PresenceFrame};
use crate::ws::ConnectionRegistry;

/// Order a presence snapshot: `priority` first when it is online, then the
/// rest lexicographically.
pub fn ordered_usernames(online: BTreeSet<String>, priority: &str) -> Vec<String> {
    let mut users = Vec::with_capacity(online.len());
    let mut rest = online;
    if !priority.is_empty() && rest.remove(priority) {
        users.push(priority.to_string());
    }
    users.extend(rest);
    users
}

#[derive(Clone)]
pub struct PresenceBroadcaster {
    registry: Arc<ConnectionRegistry>,
    /// Usernames contained in the most recent broadcast.
    last_broadcast: Arc<Mutex<BTreeSet<String>>>,
}

impl PresenceBroadcaster {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self {
            registry,
            last_broadcast: Arc::new(Mutex::new(BTreeSet::new())),
        }
    }

    /// Send the current presence list to every registered session.
    /// Returns the list that was sent.
    ///
    /// Snapshot and send happen under one lock, so concurrent callers are
    /// serialized and the last frame every session receives reflects the
    /// latest registry state.
    pub fn broadcast_all(&self, priority: &str) -> Vec<String> {
        let mut last_broadcast = self.last_broadcast.lock();
        let online = self.registry.usernames();
        *last_broadcast = online.clone();
        let users = ordered_usernames(online, priority);

        let msg = match encode(&PresenceFrame::new(users.clone())) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode presence frame");
                return users;
            }
        };

        let targets = self.registry.all_sessions();
        let report: FanoutReport = send_to_sessions(&targets, &msg, None);
        drop(last_broadcast);

        tracing::debug!(
            users = users.len(),
            delivered = report.delivered,
            failed = report.failed,
            "Presence broadcast"
        );
        users
    }

    /// True when `username` is online but the last broadcast did not list it.
    pub fn is_stale_for(&self, username: &str) -> bool {
        self.registry.is_online(username) && !self.last_broadcast.lock().contains(username)
    }
}
