//! # Player Connection Management
//!
//! This module drives a single client connection from the handshake to
//! teardown.
//!
//! # Architecture
//!
//! Each connection runs as two Tokio tasks:
//! - the read loop ([`serve`]) decodes frames and runs the state machine
//! - the drain task ([`OutboundQueue::drain`](crate::queue::OutboundQueue::drain)) writes queued packets and
//!   sends keep-alive challenges
//!
//! The outbound queue is the only structure the two tasks share besides the
//! session state behind [`SessionShared`](crate::session::SessionShared).
//!
//! # Lifecycle
//!
//! ```text
//! Handshaking → Status ──────────────→ Disconnected
//!      ↓                                   ↑
//!    Login → (key exchange) → Play ────────┘
//! ```
//!
//! Every exit path (peer close, fatal error, kick, keep-alive expiry, server
//! shutdown) goes through the same teardown guard, which releases the
//! session exactly once.
//!
//! Cancellation is observed while a frame read is still pending: a partly
//! received frame is dropped rather than completed, so a silent peer cannot
//! hold the read task open after a kick or shutdown.

use std::sync::Arc;
use std::time::Duration;

use basalt_core::{BasaltError, ConnectionId, ConnectionState, Result};
use basalt_protocol::{
    session_hash, Direction, EncryptionRequest, EncryptionResponse, FrameReader, FrameWriter, Handshake,
    KeepAliveResponse, KeyExchange, LoginPluginResponse, LoginStart, LoginSuccess, Packet, PacketDef, Ping,
    PlayerSample, PluginMessage, Pong, ServerKeyPair, ServerStatus, SetCompression, StatusRequest,
    PROTOCOL_VERSION, SERVERBOUND_KEEP_ALIVE, VERSION_NAME,
};
use bytes::Bytes;
use parking_lot::RwLock;
use rand::Rng;
use tokio::io::{AsyncRead, AsyncWrite, BufReader, ReadHalf};
use tokio_util::sync::CancellationToken;

use crate::config::NetworkConfig;
use crate::events::{NoopEvents, SessionEvents};
use crate::handlers::{HandlerRegistry, PlayContext};
use crate::identity::{GameProfile, IdentityProvider, OfflineIdentity};
use crate::queue;
use crate::registry::OnlineSessionRegistry;
use crate::session::{SessionHandle, SessionShared};

/// How long teardown waits for queued packets to reach the socket
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Number of players listed in a status response
const STATUS_SAMPLE_LIMIT: usize = 12;

const DUPLICATE_LOGIN_REASON: &str = "You logged in from another location";

/// Everything a connection needs from the server
#[derive(Clone)]
pub struct ConnectionContext {
    pub config: Arc<NetworkConfig>,

    /// Server key pair; required in online mode
    pub keys: Option<Arc<ServerKeyPair>>,

    pub identity: Arc<dyn IdentityProvider>,
    pub sessions: Arc<OnlineSessionRegistry>,
    pub handlers: Arc<RwLock<HandlerRegistry>>,
    pub events: Arc<dyn SessionEvents>,
}

impl ConnectionContext {
    /// Context with offline identities, no handlers and no event hooks
    pub fn new(config: NetworkConfig) -> Self {
        Self {
            config: Arc::new(config),
            keys: None,
            identity: Arc::new(OfflineIdentity),
            sessions: Arc::new(OnlineSessionRegistry::new()),
            handlers: Arc::new(RwLock::new(HandlerRegistry::new())),
            events: Arc::new(NoopEvents),
        }
    }

    pub fn with_keys(mut self, keys: Arc<ServerKeyPair>) -> Self {
        self.keys = Some(keys);
        self
    }

    pub fn with_identity(mut self, identity: Arc<dyn IdentityProvider>) -> Self {
        self.identity = identity;
        self
    }

    pub fn with_events(mut self, events: Arc<dyn SessionEvents>) -> Self {
        self.events = events;
        self
    }

    pub fn with_sessions(mut self, sessions: Arc<OnlineSessionRegistry>) -> Self {
        self.sessions = sessions;
        self
    }

    pub fn with_handlers(mut self, handlers: Arc<RwLock<HandlerRegistry>>) -> Self {
        self.handlers = handlers;
        self
    }
}

impl std::fmt::Debug for ConnectionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionContext")
            .field("config", &self.config)
            .field("online_mode", &self.keys.is_some())
            .field("sessions", &self.sessions.len())
            .finish()
    }
}

/// Where a connection is within the Login state
#[derive(Debug)]
enum LoginProgress {
    AwaitingStart,
    AwaitingEncryption { username: String, exchange: KeyExchange },
    Done,
}

/// Releases the session on every exit path
struct Teardown {
    session: SessionHandle,
    sessions: Arc<OnlineSessionRegistry>,
    events: Arc<dyn SessionEvents>,
}

impl Drop for Teardown {
    fn drop(&mut self) {
        let Some(previous) = self.session.shared().release() else {
            return;
        };

        if let Some(uuid) = self.session.uuid() {
            self.sessions.remove_if(uuid, self.session.id());
        }
        if previous == ConnectionState::Play {
            self.events.on_leave(&self.session);
        }

        tracing::debug!("Connection {} released (was {})", self.session.id(), previous.as_str());
    }
}

/// Run one connection to completion
///
/// Returns the fatal error that ended the connection, if any. A peer close or
/// cancellation is a normal end.
pub async fn serve<S>(stream: S, id: ConnectionId, ctx: ConnectionContext, cancel: CancellationToken) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (read_half, write_half) = tokio::io::split(stream);

    let shared = Arc::new(SessionShared::new(id, cancel.clone(), ctx.config.max_missed_keepalives));
    let (sender, queue) = queue::channel(cancel.clone());
    let session = SessionHandle::new(shared.clone(), sender.clone());

    let _teardown = Teardown {
        session: session.clone(),
        sessions: ctx.sessions.clone(),
        events: ctx.events.clone(),
    };

    let drain_session = shared.clone();
    let keepalive_interval = ctx.config.keepalive_interval;
    let mut drain = tokio::spawn(async move {
        let result = queue
            .drain(FrameWriter::new(write_half), drain_session.clone(), keepalive_interval)
            .await;
        if let Err(e) = &result {
            tracing::debug!("Connection {} write failed: {}", drain_session.id(), e);
        }
        // nothing else can reach the peer once the drain is gone
        drain_session.cancel();
        result
    });

    let reader = FrameReader::new(
        BufReader::with_capacity(ctx.config.read_buffer_size, read_half),
        Direction::Serverbound,
    );
    let mut connection = Connection {
        reader,
        session: session.clone(),
        ctx,
        login: LoginProgress::AwaitingStart,
    };

    let result = connection.run(&cancel).await;

    if let Err(e) = &result {
        tracing::warn!("Connection {} closed ({}): {}", id, session.state().as_str(), e);
        match e.disconnect_reason() {
            Some(reason) => session.disconnect(reason),
            None => session.cancel(),
        }
    }

    sender.close();
    if tokio::time::timeout(DRAIN_TIMEOUT, &mut drain).await.is_err() {
        tracing::debug!("Connection {} drain did not finish, aborting", id);
        drain.abort();
    }
    cancel.cancel();

    result
}

/// Read side of one connection
struct Connection<S> {
    reader: FrameReader<BufReader<ReadHalf<S>>>,
    session: SessionHandle,
    ctx: ConnectionContext,
    login: LoginProgress,
}

impl<S: AsyncRead + Send> Connection<S> {
    async fn run(&mut self, cancel: &CancellationToken) -> Result<()> {
        loop {
            // an in-flight read is abandoned on cancel
            let frame = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(()),
                frame = self.reader.read_frame() => frame?,
            };

            let Some(packet) = frame else {
                tracing::debug!("Connection {} closed by peer", self.session.id());
                return Ok(());
            };

            tracing::trace!(
                "Connection {} recv 0x{:02X} ({} bytes) in {}",
                self.session.id(),
                packet.id,
                packet.len(),
                self.session.state().as_str()
            );
            self.handle_packet(packet).await?;
        }
    }

    async fn handle_packet(&mut self, packet: Packet) -> Result<()> {
        match self.session.state() {
            ConnectionState::Handshaking => self.handle_handshake(packet),
            ConnectionState::Status => self.handle_status(packet),
            ConnectionState::Login => self.handle_login(packet).await,
            ConnectionState::Play => self.handle_play(packet).await,
            ConnectionState::Disconnected => Ok(()),
        }
    }

    fn handle_handshake(&mut self, packet: Packet) -> Result<()> {
        if packet.id != Handshake::ID {
            return Err(unexpected(&packet, ConnectionState::Handshaking));
        }

        let handshake: Handshake = packet.decode()?;
        let next = handshake.requested_state()?;
        tracing::debug!(
            "Connection {} handshake: protocol {}, {}:{}, next {}",
            self.session.id(),
            handshake.protocol_version,
            handshake.server_address,
            handshake.server_port,
            next.as_str()
        );
        self.session.shared().transition(next)?;

        if next == ConnectionState::Login && handshake.protocol_version != PROTOCOL_VERSION {
            let side = if handshake.protocol_version < PROTOCOL_VERSION { "client" } else { "server" };
            return Err(BasaltError::ProtocolViolation(format!(
                "Outdated {}! Please use {}",
                side, VERSION_NAME
            )));
        }
        Ok(())
    }

    fn handle_status(&mut self, packet: Packet) -> Result<()> {
        match packet.id {
            StatusRequest::ID => {
                packet.decode::<StatusRequest>()?;
                let sessions = &self.ctx.sessions;
                let sample = sessions
                    .sample(STATUS_SAMPLE_LIMIT)
                    .into_iter()
                    .map(|profile| PlayerSample { name: profile.username, id: profile.uuid.to_string() })
                    .collect();
                let online = u32::try_from(sessions.len()).unwrap_or(u32::MAX);
                let status = ServerStatus::new(&self.ctx.config.motd, online, self.ctx.config.max_players, sample);
                self.session.send_def(&status.to_response());
                Ok(())
            }
            Ping::ID => {
                let ping: Ping = packet.decode()?;
                self.session.send_def(&Pong { payload: ping.payload });
                // one-shot exchange
                self.session.sender().close();
                Ok(())
            }
            _ => Err(unexpected(&packet, ConnectionState::Status)),
        }
    }

    async fn handle_login(&mut self, packet: Packet) -> Result<()> {
        match (packet.id, std::mem::replace(&mut self.login, LoginProgress::Done)) {
            (LoginStart::ID, LoginProgress::AwaitingStart) => {
                let start: LoginStart = packet.decode()?;
                self.login_start(start.username).await
            }
            (EncryptionResponse::ID, LoginProgress::AwaitingEncryption { username, exchange }) => {
                let response: EncryptionResponse = packet.decode()?;
                self.encryption_response(username, exchange, response).await
            }
            (LoginPluginResponse::ID, progress) => {
                let response: LoginPluginResponse = packet.decode()?;
                tracing::trace!(
                    "Connection {} plugin response {} ({})",
                    self.session.id(),
                    response.message_id,
                    response.successful
                );
                self.login = progress;
                Ok(())
            }
            (LoginStart::ID, _) | (EncryptionResponse::ID, _) => Err(BasaltError::ProtocolViolation(format!(
                "Unexpected login packet 0x{:02X}",
                packet.id
            ))),
            _ => Err(unexpected(&packet, ConnectionState::Login)),
        }
    }

    async fn login_start(&mut self, requested: String) -> Result<()> {
        let username = if self.ctx.config.multiplayer_debug_mode {
            format!("Player{}", rand::thread_rng().gen_range(1..=999))
        } else {
            requested
        };
        tracing::info!("Connection {} logging in as {}", self.session.id(), username);

        self.ctx.sessions.kick_by_name(&username, DUPLICATE_LOGIN_REASON);

        if !self.ctx.config.online_mode {
            let profile = self.ctx.identity.lookup_offline(&username).await?;
            return self.finish_login(profile).await;
        }

        let keys = self.keys()?;
        let exchange = KeyExchange::new();
        self.session.send_def(&EncryptionRequest {
            server_id: String::new(),
            public_key: Bytes::copy_from_slice(keys.public_der()),
            verify_token: Bytes::copy_from_slice(exchange.verify_token()),
        });
        self.login = LoginProgress::AwaitingEncryption { username, exchange };
        Ok(())
    }

    async fn encryption_response(
        &mut self,
        username: String,
        exchange: KeyExchange,
        response: EncryptionResponse,
    ) -> Result<()> {
        let keys = self.keys()?;
        let secret = exchange.complete(&keys, &response.shared_secret, &response.verify_token)?;
        let hash = session_hash("", &secret, keys.public_der());

        // the client encrypts everything after its Encryption Response, so both ciphers go in before the lookup
        self.reader.enable_encryption(&secret)?;
        self.session.sender().enable_encryption(secret);
        tracing::debug!("Connection {} encryption established", self.session.id());

        let profile = self
            .ctx
            .identity
            .lookup(&username, &hash)
            .await?
            .ok_or_else(|| BasaltError::AuthenticationFailure("Failed to verify username!".into()))?;
        self.finish_login(profile).await
    }

    async fn finish_login(&mut self, profile: GameProfile) -> Result<()> {
        let sender = self.session.sender();

        if let Some(threshold) = self.ctx.config.compression_threshold {
            let wire_threshold = i32::try_from(threshold)
                .map_err(|_| BasaltError::Config(format!("Compression threshold {} too large", threshold)))?;
            sender.send_def(&SetCompression { threshold: wire_threshold });
            sender.enable_compression(threshold);
            self.reader.enable_compression(threshold)?;
        }

        sender.send_def(&LoginSuccess { uuid: profile.uuid, username: profile.username.clone() });
        tracing::info!("{} ({}) logged in on connection {}", profile.username, profile.uuid, self.session.id());

        self.session.shared().set_profile(profile);
        self.session.shared().transition(ConnectionState::Play)?;

        if let Some(previous) = self.ctx.sessions.add(self.session.clone()) {
            if previous.id() != self.session.id() {
                previous.disconnect(DUPLICATE_LOGIN_REASON);
            }
        }

        self.ctx.events.on_join(&self.session).await?;
        self.session.send_def(&PluginMessage::brand(&self.ctx.config.brand));
        Ok(())
    }

    async fn handle_play(&mut self, packet: Packet) -> Result<()> {
        if packet.is_empty() {
            tracing::debug!(
                "Connection {} reset by empty packet 0x{:02X}",
                self.session.id(),
                packet.id
            );
            self.session.cancel();
            return Ok(());
        }

        if packet.id == SERVERBOUND_KEEP_ALIVE {
            let response: KeepAliveResponse = packet.decode()?;
            if !self.session.shared().keepalive_acknowledge(response.id) {
                tracing::trace!("Connection {} stale keep-alive {}", self.session.id(), response.id);
            }
            return Ok(());
        }

        let id = packet.id;
        let handled =
            HandlerRegistry::dispatch(&self.ctx.handlers, PlayContext { packet, session: self.session.clone() })
                .await?;
        if !handled {
            tracing::trace!("Connection {} no handler for 0x{:02X}", self.session.id(), id);
        }
        Ok(())
    }

    fn keys(&self) -> Result<Arc<ServerKeyPair>> {
        self.ctx
            .keys
            .clone()
            .ok_or_else(|| BasaltError::Encryption("Online mode without a server key pair".into()))
    }
}

fn unexpected(packet: &Packet, state: ConnectionState) -> BasaltError {
    BasaltError::ProtocolViolation(format!("Unexpected packet 0x{:02X} in {}", packet.id, state.as_str()))
}
