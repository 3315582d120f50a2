use axum::extract::ws::Message;

use super::registry::{SessionHandle, SessionId};

/// A write to one recipient's connection failed.
#[derive(Debug, thiserror::Error)]
#[error("delivery to {username} (session {session_id}) failed: connection writer is gone")]
pub struct DeliveryError {
    pub session_id: SessionId,
    pub username: String,
}

/// Outcome of delivering one frame to a set of sessions.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FanoutReport {
    pub delivered: usize,
    pub failed: usize,
}

impl FanoutReport {
    pub fn merge(self, other: FanoutReport) -> FanoutReport {
        FanoutReport {
            delivered: self.delivered + other.delivered,
            failed: self.failed + other.failed,
        }
    }
}

/// Push a frame to one session.
pub fn deliver(target: &SessionHandle, msg: Message) -> Result<(), DeliveryError> {
    target.sender.send(msg).map_err(|_| DeliveryError {
        session_id: target.id,
        username: target.username.clone(),
    })
}

/// Push a frame to every session in `targets`, skipping `except`.
/// A failed write is logged and never stops delivery to the rest.
pub fn send_to_sessions(
    targets: &[SessionHandle],
    msg: &Message,
    except: Option<SessionId>,
) -> FanoutReport {
    let mut report = FanoutReport::default();
    for target in targets {
        if Some(target.id) == except {
            continue;
        }
        match deliver(target, msg.clone()) {
            Ok(()) => report.delivered += 1,
            Err(e) => {
                tracing::warn!(
                    username = %e.username,
                    session_id = %e.session_id,
                    error = %e,
                    "Delivery failed"
                );
                report.failed += 1;
            }
        }
    }
    report
}
