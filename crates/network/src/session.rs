//! Per-connection session state
//!
//! [`SessionShared`] is the part of a session both connection tasks see:
//! lifecycle state, keep-alive counters and the cancellation token. A
//! [`SessionHandle`] pairs it with the outbound [`PacketSender`] and is what
//! the online registry and gameplay handlers hold.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use basalt_core::{BasaltError, ConnectionId, ConnectionState, Result};
use basalt_protocol::{ChatMessage, Encode, LoginDisconnect, Packet, PacketDef, PlayDisconnect};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::identity::GameProfile;
use crate::keepalive::{KeepAlive, KeepAliveTick};
use crate::queue::PacketSender;

/// State shared by a connection's read and drain tasks
#[derive(Debug)]
pub struct SessionShared {
    id: ConnectionId,
    state: Mutex<ConnectionState>,
    keepalive: Mutex<KeepAlive>,
    profile: Mutex<Option<GameProfile>>,
    cancel: CancellationToken,
    released: AtomicBool,
    epoch: Instant,
}

impl SessionShared {
    pub fn new(id: ConnectionId, cancel: CancellationToken, max_missed_keepalives: u32) -> Self {
        Self {
            id,
            state: Mutex::new(ConnectionState::Handshaking),
            keepalive: Mutex::new(KeepAlive::new(max_missed_keepalives)),
            profile: Mutex::new(None),
            cancel,
            released: AtomicBool::new(false),
            epoch: Instant::now(),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    /// Move to `next`; backwards or skipping moves are protocol violations
    pub fn transition(&self, next: ConnectionState) -> Result<()> {
        let mut state = self.state.lock();
        if !state.can_transition_to(next) {
            return Err(BasaltError::ProtocolViolation(format!(
                "Illegal state transition {} -> {}",
                state.as_str(),
                next.as_str()
            )));
        }
        tracing::debug!("Connection {} state: {} -> {}", self.id, state.as_str(), next.as_str());
        *state = next;
        Ok(())
    }

    pub fn profile(&self) -> Option<GameProfile> {
        self.profile.lock().clone()
    }

    pub fn set_profile(&self, profile: GameProfile) {
        *self.profile.lock() = Some(profile);
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Advance the keep-alive clock; the nonce is milliseconds since the session began
    pub fn keepalive_tick(&self) -> KeepAliveTick {
        let nonce = self.epoch.elapsed().as_millis() as i64;
        self.keepalive.lock().tick(nonce)
    }

    pub fn keepalive_acknowledge(&self, nonce: i64) -> bool {
        self.keepalive.lock().acknowledge(nonce)
    }

    pub fn latency(&self) -> Option<Duration> {
        self.keepalive.lock().latency()
    }

    /// Mark the session finished and cancel both tasks
    ///
    /// Returns the state the session was in for the first caller only, so
    /// racing teardown triggers release everything exactly once.
    pub fn release(&self) -> Option<ConnectionState> {
        if self.released.swap(true, Ordering::AcqRel) {
            return None;
        }
        let previous = {
            let mut state = self.state.lock();
            std::mem::replace(&mut *state, ConnectionState::Disconnected)
        };
        self.cancel.cancel();
        Some(previous)
    }
}

/// Cloneable reference to a live session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    shared: Arc<SessionShared>,
    sender: PacketSender,
}

impl SessionHandle {
    pub fn new(shared: Arc<SessionShared>, sender: PacketSender) -> Self {
        Self { shared, sender }
    }

    pub fn id(&self) -> ConnectionId {
        self.shared.id()
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    pub fn shared(&self) -> &Arc<SessionShared> {
        &self.shared
    }

    pub fn sender(&self) -> &PacketSender {
        &self.sender
    }

    pub fn profile(&self) -> Option<GameProfile> {
        self.shared.profile()
    }

    pub fn uuid(&self) -> Option<Uuid> {
        self.shared.profile.lock().as_ref().map(|p| p.uuid)
    }

    pub fn username(&self) -> Option<String> {
        self.shared.profile.lock().as_ref().map(|p| p.username.clone())
    }

    pub fn latency(&self) -> Option<Duration> {
        self.shared.latency()
    }

    /// Queue a packet; dropped silently once the session is cancelled
    pub fn send(&self, packet: Packet) -> bool {
        self.sender.send(packet)
    }

    pub fn send_def<T: PacketDef + Encode>(&self, def: &T) -> bool {
        self.sender.send_def(def)
    }

    /// Close with a reason in the packet matching the current state
    ///
    /// Handshaking and Status have no disconnect packet and just close.
    pub fn disconnect(&self, reason: impl Into<ChatMessage>) {
        let reason = reason.into();
        match self.state() {
            ConnectionState::Login => {
                self.sender.send_def(&LoginDisconnect { reason });
            }
            ConnectionState::Play => {
                self.sender.send_def(&PlayDisconnect { reason });
            }
            _ => {}
        }
        self.sender.close();
    }

    pub fn cancel(&self) {
        self.shared.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{self, Outbound};

    fn shared() -> Arc<SessionShared> {
        Arc::new(SessionShared::new(ConnectionId::new(1), CancellationToken::new(), 3))
    }

    #[test]
    fn test_transitions_are_forward_only() {
        let session = shared();
        session.transition(ConnectionState::Login).unwrap();
        assert!(matches!(
            session.transition(ConnectionState::Status),
            Err(BasaltError::ProtocolViolation(_))
        ));
        session.transition(ConnectionState::Play).unwrap();
        assert!(session.transition(ConnectionState::Login).is_err());
    }

    #[test]
    fn test_release_once() {
        let session = shared();
        session.transition(ConnectionState::Status).unwrap();

        assert_eq!(session.release(), Some(ConnectionState::Status));
        assert_eq!(session.release(), None);
        assert_eq!(session.state(), ConnectionState::Disconnected);
        assert!(session.is_cancelled());
    }

    #[tokio::test]
    async fn test_disconnect_uses_state_packet() {
        let session = shared();
        let (sender, mut queue) = queue::channel(session.cancel_token().clone());
        let handle = SessionHandle::new(session.clone(), sender);

        session.transition(ConnectionState::Login).unwrap();
        handle.disconnect("Bye");

        match queue.recv().await {
            Some(Outbound::Packet(packet)) => assert_eq!(packet.id, LoginDisconnect::ID),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(queue.recv().await, Some(Outbound::Close)));
    }

    #[tokio::test]
    async fn test_disconnect_in_status_only_closes() {
        let session = shared();
        let (sender, mut queue) = queue::channel(session.cancel_token().clone());
        let handle = SessionHandle::new(session.clone(), sender);

        session.transition(ConnectionState::Status).unwrap();
        handle.disconnect("Bye");
        assert!(matches!(queue.recv().await, Some(Outbound::Close)));
    }
}
