use std::sync::Arc;
use std::time::Duration;

use crate::auth::{SessionAuthenticator, SqliteSessionAuthenticator};
use crate::chat::presence::PresenceBroadcaster;
use crate::chat::router::MessageRouter;
use crate::chat::store::{MessageStore, SqliteMessageStore};
use crate::config::Config;
use crate::db::DbPool;
use crate::ws::ConnectionRegistry;

/// Keepalive policy for the `Active` connection state.
#[derive(Debug, Clone, Copy)]
pub struct Keepalive {
    pub ping_interval: Duration,
    pub pong_timeout: Duration,
}

impl Default for Keepalive {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(30),
            pong_timeout: Duration::from_secs(10),
        }
    }
}

/// Shared application state passed to all handlers via axum State extractor.
#[derive(Clone)]
pub struct AppState {
    /// SQLite connection wrapped in Arc<Mutex>
    pub db: DbPool,
    /// Live chat connections per user
    pub registry: Arc<ConnectionRegistry>,
    pub presence: PresenceBroadcaster,
    pub router: Arc<MessageRouter>,
    pub authenticator: Arc<dyn SessionAuthenticator>,
    pub store: Arc<dyn MessageStore>,
    pub keepalive: Keepalive,
    pub history_page_size: u32,
    /// Cookie name carrying the session token
    pub session_cookie: String,
}

impl AppState {
    /// Wire the SQLite-backed collaborators around one fresh registry.
    pub fn new(db: DbPool, config: &Config) -> Self {
        let authenticator = Arc::new(SqliteSessionAuthenticator::new(db.clone()));
        let store = Arc::new(SqliteMessageStore::new(db.clone()));
        let keepalive = Keepalive {
            ping_interval: Duration::from_secs(config.ping_interval_secs),
            pong_timeout: Duration::from_secs(config.pong_timeout_secs),
        };
        Self::with_components(
            db,
            authenticator,
            store,
            keepalive,
            config.history_page_size,
            config.session_cookie.clone(),
        )
    }

    pub fn with_components(
        db: DbPool,
        authenticator: Arc<dyn SessionAuthenticator>,
        store: Arc<dyn MessageStore>,
        keepalive: Keepalive,
        history_page_size: u32,
        session_cookie: String,
    ) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let presence = PresenceBroadcaster::new(Arc::clone(&registry));
        let router = Arc::new(MessageRouter::new(
            Arc::clone(&registry),
            Arc::clone(&store),
            presence.clone(),
        ));
        Self {
            db,
            registry,
            presence,
            router,
            authenticator,
            store,
            keepalive,
            history_page_size,
            session_cookie,
        }
    }
}
