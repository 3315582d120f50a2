//! Inbound chat frame routing: validate, stamp, persist, fan out.
//!
//! `route` is awaited by the connection's own receive loop, so frames from
//! one session are persisted and delivered in the order they were read.

use std::sync::Arc;

use crate::chat::message::ChatMessage;
use crate::chat::presence::PresenceBroadcaster;
use crate::chat::store::{MessageStore, StoreError};
use crate::ws::broadcast::{send_to_sessions, FanoutReport};
use crate::ws::protocol::{self, encode, DecodeError, Inbound, TypingFrame};
use crate::ws::{ConnectionRegistry, Session};

#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("decode: {0}")]
    Decode(#[from] DecodeError),
    #[error("validation: {0}")]
    Validation(&'static str),
    #[error("persistence: {0}")]
    Persistence(#[from] StoreError),
}

impl RouteError {
    /// Log at the level the error kind calls for. None of these close the
    /// connection.
    pub fn log(&self, session: &Session) {
        match self {
            Self::Decode(_) | Self::Validation(_) => tracing::warn!(
                username = %session.username,
                session_id = %session.id,
                error = %self,
                "Dropped inbound frame"
            ),
            Self::Persistence(_) => tracing::error!(
                username = %session.username,
                session_id = %session.id,
                error = %self,
                "Message not persisted, skipping live delivery"
            ),
        }
    }
}

/// What a successfully routed frame produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Routed {
    Chat {
        message: ChatMessage,
        report: FanoutReport,
    },
    Typing {
        report: FanoutReport,
    },
}

pub struct MessageRouter {
    registry: Arc<ConnectionRegistry>,
    store: Arc<dyn MessageStore>,
    presence: PresenceBroadcaster,
}

impl MessageRouter {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        store: Arc<dyn MessageStore>,
        presence: PresenceBroadcaster,
    ) -> Self {
        Self {
            registry,
            store,
            presence,
        }
    }

    /// Route one text frame read from `origin`.
    pub async fn route(&self, origin: &Session, raw: &str) -> Result<Routed, RouteError> {
        let inbound = protocol::decode_inbound(raw)?;
        self.route_inbound(origin, inbound).await
    }

    /// Route one binary frame; its payload must be UTF-8 JSON.
    pub async fn route_binary(&self, origin: &Session, raw: &[u8]) -> Result<Routed, RouteError> {
        let inbound = protocol::decode_binary(raw)?;
        self.route_inbound(origin, inbound).await
    }

    async fn route_inbound(&self, origin: &Session, inbound: Inbound) -> Result<Routed, RouteError> {
        match inbound {
            Inbound::Chat { to, content } => self.route_chat(origin, to, content).await,
            Inbound::Typing { to, is_typing } => self.relay_typing(origin, &to, is_typing),
        }
    }

    async fn route_chat(
        &self,
        origin: &Session,
        to: String,
        content: String,
    ) -> Result<Routed, RouteError> {
        if to.is_empty() {
            return Err(RouteError::Validation("receiver is empty"));
        }

        let message = ChatMessage::stamped(&origin.username, &to, content);

        // Persistence gates delivery: nothing goes out live unless stored.
        let store = Arc::clone(&self.store);
        let record = message.clone();
        tokio::task::spawn_blocking(move || store.append(&record))
            .await
            .map_err(|e| StoreError::TaskJoin(e.to_string()))??;

        let frame = match encode(&message) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode chat frame");
                return Ok(Routed::Chat {
                    message,
                    report: FanoutReport::default(),
                });
            }
        };

        let receiver_sessions = self.registry.sessions_for(&message.to);
        let mut report = send_to_sessions(&receiver_sessions, &frame, None);

        // The sender's other tabs see the message; the sending tab does not.
        // A self-addressed message already reached every sender session above.
        if message.to != message.from {
            let sender_sessions = self.registry.sessions_for(&message.from);
            report = report.merge(send_to_sessions(&sender_sessions, &frame, Some(origin.id)));
        }

        if !receiver_sessions.is_empty() && self.presence.is_stale_for(&message.to) {
            self.presence.broadcast_all(&message.from);
        }

        tracing::debug!(
            from = %message.from,
            to = %message.to,
            delivered = report.delivered,
            failed = report.failed,
            "Chat message routed"
        );

        Ok(Routed::Chat { message, report })
    }

    fn relay_typing(
        &self,
        origin: &Session,
        to: &str,
        is_typing: bool,
    ) -> Result<Routed, RouteError> {
        if to.is_empty() {
            return Err(RouteError::Validation("receiver is empty"));
        }
        let report = match encode(&TypingFrame::new(&origin.username, to, is_typing)) {
            Ok(frame) => send_to_sessions(&self.registry.sessions_for(to), &frame, None),
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode typing frame");
                FanoutReport::default()
            }
        };
        Ok(Routed::Typing { report })
    }
}
