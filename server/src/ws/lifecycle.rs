//! Per-connection state machine.
//!
//! `Connecting -> Authenticating -> Registered -> Active -> Closing -> Closed`,
//! with `Authenticating -> Closed` on a rejected credential and a direct
//! close from any pre-registration state when the upgrade fails.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Authenticating,
    Registered,
    Active,
    Closing,
    Closed,
}

impl ConnectionState {
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (self, next),
            (Connecting, Authenticating)
                | (Connecting, Closed)
                | (Authenticating, Registered)
                | (Authenticating, Closed)
                | (Registered, Active)
                | (Registered, Closing)
                | (Active, Closing)
                | (Closing, Closed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Authenticating => "authenticating",
            Self::Registered => "registered",
            Self::Active => "active",
            Self::Closing => "closing",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracks and logs the state of one connection.
#[derive(Debug)]
pub struct Lifecycle {
    state: ConnectionState,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Connecting,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Move to `next`. Returns false and stays put if the move is invalid.
    pub fn advance(&mut self, next: ConnectionState) -> bool {
        if !self.state.can_transition_to(next) {
            tracing::error!(from = %self.state, to = %next, "Invalid connection state transition");
            return false;
        }
        tracing::trace!(from = %self.state, to = %next, "Connection state transition");
        self.state = next;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ConnectionState::*;

    #[test]
    fn test_happy_path() {
        let mut lc = Lifecycle::new();
        for next in [Authenticating, Registered, Active, Closing, Closed] {
            assert!(lc.advance(next), "failed to enter {next}");
        }
        assert_eq!(lc.state(), Closed);
    }

    #[test]
    fn test_auth_failure_goes_straight_to_closed() {
        let mut lc = Lifecycle::new();
        assert!(lc.advance(Authenticating));
        assert!(lc.advance(Closed));
    }

    #[test]
    fn test_closed_is_terminal() {
        let mut lc = Lifecycle::new();
        assert!(lc.advance(Authenticating));
        assert!(lc.advance(Closed));
        for next in [Connecting, Authenticating, Registered, Active, Closing] {
            assert!(!lc.advance(next));
        }
        assert_eq!(lc.state(), Closed);
    }

    #[test]
    fn test_no_registry_shortcuts() {
        assert!(!Connecting.can_transition_to(Active));
        assert!(!Authenticating.can_transition_to(Active));
        assert!(!Active.can_transition_to(Closed));
    }
}
