//! Core type definitions

use serde::{Deserialize, Serialize};

/// Connection ID (32-bit unsigned), unique for the process lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub u32);

impl ConnectionId {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

impl From<u32> for ConnectionId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle state of a client connection
///
/// # Transitions
/// ```text
/// Handshaking → Status
/// Handshaking → Login → Play
/// any → Disconnected (terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionState {
    Handshaking,
    Status,
    Login,
    Play,
    Disconnected,
}

impl ConnectionState {
    /// Map the `next state` field of a handshake.
    ///
    /// Only Status (1) and Login (2) may be requested by a client.
    pub fn from_handshake(value: i32) -> Option<Self> {
        match value {
            1 => Some(Self::Status),
            2 => Some(Self::Login),
            _ => None,
        }
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::{Disconnected, Handshaking, Login, Play, Status};

        match (self, next) {
            (Disconnected, _) => false,
            (_, Disconnected) => true,
            (Handshaking, Status) | (Handshaking, Login) | (Login, Play) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Handshaking => "handshaking",
            Self::Status => "status",
            Self::Login => "login",
            Self::Play => "play",
            Self::Disconnected => "disconnected",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handshake_states() {
        assert_eq!(ConnectionState::from_handshake(1), Some(ConnectionState::Status));
        assert_eq!(ConnectionState::from_handshake(2), Some(ConnectionState::Login));
        assert_eq!(ConnectionState::from_handshake(3), None);
        assert_eq!(ConnectionState::from_handshake(0), None);
    }

    #[test]
    fn test_transitions_never_go_backward() {
        use ConnectionState::*;

        assert!(Handshaking.can_transition_to(Login));
        assert!(Login.can_transition_to(Play));
        assert!(Play.can_transition_to(Disconnected));
        assert!(Status.can_transition_to(Disconnected));

        assert!(!Play.can_transition_to(Login));
        assert!(!Login.can_transition_to(Handshaking));
        assert!(!Handshaking.can_transition_to(Play));
        assert!(!Status.can_transition_to(Login));
        assert!(!Disconnected.can_transition_to(Play));
        assert!(!Disconnected.can_transition_to(Disconnected));
    }
}
