//! # Online Session Registry
//!
//! Every session that completed login, keyed by player UUID.
//!
//! # Thread Safety
//! Backed by a `DashMap`; add and remove are safe from any number of
//! connection lifecycles at once.

use basalt_core::{ConnectionId, ConnectionState};
use basalt_protocol::Packet;
use dashmap::DashMap;
use uuid::Uuid;

use crate::identity::GameProfile;
use crate::session::SessionHandle;

#[derive(Debug, Default)]
pub struct OnlineSessionRegistry {
    sessions: DashMap<Uuid, SessionHandle>,
}

impl OnlineSessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a logged-in session
    ///
    /// Returns the session previously registered under the same UUID, if
    /// any. Sessions without a profile are not registered.
    pub fn add(&self, session: SessionHandle) -> Option<SessionHandle> {
        let uuid = session.uuid()?;
        tracing::debug!("Registering session {} as {}", session.id(), uuid);
        self.sessions.insert(uuid, session)
    }

    /// Remove `uuid` only if it still belongs to connection `id`
    pub fn remove_if(&self, uuid: Uuid, id: ConnectionId) -> bool {
        let removed = self.sessions.remove_if(&uuid, |_, session| session.id() == id).is_some();
        if removed {
            tracing::debug!("Unregistered session {} ({})", id, uuid);
        }
        removed
    }

    pub fn get(&self, uuid: &Uuid) -> Option<SessionHandle> {
        self.sessions.get(uuid).map(|entry| entry.clone())
    }

    /// Case-insensitive username lookup
    pub fn find_by_name(&self, username: &str) -> Option<SessionHandle> {
        self.sessions
            .iter()
            .find(|entry| {
                entry
                    .value()
                    .username()
                    .map_or(false, |name| name.eq_ignore_ascii_case(username))
            })
            .map(|entry| entry.value().clone())
    }

    /// Disconnect and unregister the session using `username`
    pub fn kick_by_name(&self, username: &str, reason: &str) -> bool {
        let Some(session) = self.find_by_name(username) else {
            return false;
        };
        tracing::info!("Kicking {} ({}): {}", username, session.id(), reason);
        session.disconnect(reason);
        if let Some(uuid) = session.uuid() {
            self.remove_if(uuid, session.id());
        }
        true
    }

    /// Queue `packet` on every session in Play
    ///
    /// # Returns
    /// The number of sessions the packet was queued for
    pub fn broadcast(&self, packet: &Packet) -> usize {
        self.broadcast_filtered(packet, |_| true)
    }

    /// Like [`broadcast`](Self::broadcast) but skips connection `except`
    pub fn broadcast_except(&self, packet: &Packet, except: ConnectionId) -> usize {
        self.broadcast_filtered(packet, |session| session.id() != except)
    }

    fn broadcast_filtered(&self, packet: &Packet, filter: impl Fn(&SessionHandle) -> bool) -> usize {
        let mut sent_count = 0;
        for entry in self.sessions.iter() {
            let session = entry.value();
            if session.state() != ConnectionState::Play || !filter(session) {
                continue;
            }
            if session.send(packet.clone()) {
                sent_count += 1;
            }
        }
        tracing::debug!("Broadcast packet 0x{:02X} to {} sessions", packet.id, sent_count);
        sent_count
    }

    /// Up to `limit` profiles for the server list sample
    pub fn sample(&self, limit: usize) -> Vec<GameProfile> {
        self.sessions
            .iter()
            .filter_map(|entry| entry.value().profile())
            .take(limit)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
