//! # Basalt - Main Server Implementation
//!
//! This module provides the TCP front end that accepts client sockets and
//! hands each one to the connection engine.
//!
//! # Architecture
//!
//! ## Components
//!
//! 1. **TCP Listener** - Accepts incoming connections
//! 2. **Connection Map** - Every live socket (DashMap for concurrent access)
//! 3. **Online Sessions** - Logged-in players, shared with every connection
//! 4. **Handler Registry** - Routes Play packets to gameplay code
//! 5. **ID Generator** - Assigns connection ids
//!
//! # Shutdown
//!
//! Ctrl-C or [`Server::shutdown`] stops accepting, cancels every connection
//! through its child token and waits a few seconds for them to finish.
//!
//! # Example
//!
//! ```rust,no_run
//! use basalt_network::{NetworkConfig, NoopEvents, OfflineIdentity, Server};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = NetworkConfig {
//!         bind_address: "0.0.0.0:25565".parse()?,
//!         online_mode: false,
//!         ..Default::default()
//!     };
//!
//!     let server = Server::bind(config, Arc::new(OfflineIdentity), Arc::new(NoopEvents)).await?;
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use basalt_core::{BasaltError, ConnectionId, IdGenerator, Result};
use basalt_protocol::{Packet, ServerKeyPair};
use dashmap::DashMap;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

use crate::config::NetworkConfig;
use crate::connection::{self, ConnectionContext};
use crate::events::SessionEvents;
use crate::handlers::PlayContext;
use crate::identity::IdentityProvider;
use crate::registry::OnlineSessionRegistry;

/// How long shutdown waits for connections to finish
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// A live socket tracked by the server
#[derive(Debug, Clone)]
struct ConnectionEntry {
    addr: SocketAddr,
    cancel: CancellationToken,
}

/// Main Basalt server instance
///
/// # Thread Safety
///
/// All public methods are thread-safe and can be called from any task.
pub struct Server {
    /// TCP listener for accepting connections
    listener: TcpListener,

    /// Shared by every connection
    context: ConnectionContext,

    /// All live sockets
    connections: Arc<DashMap<ConnectionId, ConnectionEntry>>,

    id_generator: IdGenerator,

    /// Parent of every connection's cancellation token
    shutdown: CancellationToken,
}

impl Server {
    /// Validate `config`, bind the listener and prepare the key pair
    ///
    /// # Errors
    /// Returns an error if:
    /// - Configuration is invalid
    /// - TCP listener cannot be bound to the specified address
    /// - The RSA key pair cannot be generated (online mode)
    pub async fn bind(
        config: NetworkConfig,
        identity: Arc<dyn IdentityProvider>,
        events: Arc<dyn SessionEvents>,
    ) -> Result<Self> {
        config
            .validate()
            .map_err(|e| BasaltError::Config(format!("Invalid configuration: {}", e)))?;

        let listener = TcpListener::bind(config.bind_address).await.map_err(|e| {
            BasaltError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to bind to {}: {}", config.bind_address, e),
            ))
        })?;

        let online_mode = config.online_mode;
        let mut context = ConnectionContext::new(config)
            .with_identity(identity)
            .with_events(events);

        if online_mode {
            // RSA generation is CPU bound
            let keys = tokio::task::spawn_blocking(ServerKeyPair::generate)
                .await
                .map_err(|e| BasaltError::Encryption(format!("Key generation task failed: {}", e)))??;
            context = context.with_keys(Arc::new(keys));
        }

        let local = listener.local_addr()?;
        tracing::info!("Basalt listening on {}", local);
        tracing::info!(
            "Configuration: max_connections={}, online_mode={}, compression={:?}",
            context.config.max_connections,
            online_mode,
            context.config.compression_threshold
        );

        Ok(Self {
            listener,
            context,
            connections: Arc::new(DashMap::new()),
            id_generator: IdGenerator::new(),
            shutdown: CancellationToken::new(),
        })
    }

    /// Run the accept loop until Ctrl-C or [`shutdown`](Self::shutdown)
    ///
    /// # Lifecycle
    ///
    /// ```text
    /// 1. Accept incoming connection
    /// 2. Check connection limit
    /// 3. Assign connection ID
    /// 4. Spawn connection task with a child cancellation token
    /// 5. Repeat until shutdown
    /// ```
    pub async fn run(&self) -> Result<()> {
        tracing::info!("Basalt starting main loop");

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => {
                    tracing::info!("Shutdown requested");
                    break;
                }

                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Ctrl-C received, initiating shutdown");
                    break;
                }

                result = self.listener.accept() => match result {
                    Ok((socket, addr)) => self.accept(socket, addr).await,
                    Err(e) => tracing::error!("Error accepting connection: {:?}", e),
                },
            }
        }

        tracing::info!("Basalt main loop ended, closing {} connections", self.connections.len());
        self.shutdown.cancel();

        let deadline = tokio::time::Instant::now() + SHUTDOWN_GRACE;
        while !self.connections.is_empty() && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        let remaining = self.connections.len();
        if remaining > 0 {
            tracing::warn!("{} connections still open after shutdown grace period", remaining);
        }
        Ok(())
    }

    async fn accept(&self, mut socket: TcpStream, addr: SocketAddr) {
        if self.connections.len() >= self.context.config.max_connections {
            tracing::warn!("Connection from {} rejected: server full ({} connections)", addr, self.connections.len());
            let _ = socket.shutdown().await;
            return;
        }

        if let Err(e) = socket.set_nodelay(true) {
            tracing::debug!("Failed to set TCP_NODELAY for {}: {}", addr, e);
        }

        let id = self.id_generator.next_id();
        let cancel = self.shutdown.child_token();
        self.connections.insert(id, ConnectionEntry { addr, cancel: cancel.clone() });
        tracing::debug!("Connection {} accepted from {}", id, addr);

        let connections = self.connections.clone();
        let context = self.context.clone();
        tokio::spawn(async move {
            match connection::serve(socket, id, context, cancel).await {
                Ok(()) => tracing::debug!("Connection {} task completed", id),
                Err(e) => tracing::debug!("Connection {} task ended with {}", id, e),
            }
            connections.remove(&id);
        });
    }

    /// Register an async Play packet handler
    ///
    /// Can be called while the server is running; connections pick the new
    /// handler up on their next packet with that id.
    pub fn register_handler_function<F, Fut>(&self, packet_id: i32, handler: F)
    where
        F: Fn(PlayContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let mut handlers = self.context.handlers.write();
        if handlers.has_handler(packet_id) {
            tracing::warn!("Replacing handler for packet 0x{:02X}", packet_id);
        }
        handlers.register_function(packet_id, handler);
    }

    /// Logged-in players
    pub fn sessions(&self) -> &Arc<OnlineSessionRegistry> {
        &self.context.sessions
    }

    /// Queue `packet` for every player in Play
    ///
    /// # Returns
    /// The number of players the packet was queued for
    pub fn broadcast(&self, packet: &Packet) -> usize {
        self.context.sessions.broadcast(packet)
    }

    /// Close one connection by id
    pub fn kick(&self, id: ConnectionId) -> bool {
        match self.connections.get(&id) {
            Some(entry) => {
                tracing::info!("Closing connection {} ({})", id, entry.addr);
                entry.cancel.cancel();
                true
            }
            None => false,
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.context.config
    }

    /// Number of open sockets, logged in or not
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Stop accepting and close every connection
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("local_addr", &self.listener.local_addr().ok())
            .field("connections", &self.connections.len())
            .field("sessions", &self.context.sessions.len())
            .field("handlers", &self.context.handlers.read().handler_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NoopEvents;
    use crate::identity::OfflineIdentity;
    use basalt_protocol::{
        Direction, FrameReader, FrameWriter, Handshake, LoginStart, LoginSuccess, PacketDef, PluginMessage,
        StatusRequest, StatusResponse, PROTOCOL_VERSION,
    };
    use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

    fn test_config(max_connections: usize) -> NetworkConfig {
        NetworkConfig {
            bind_address: "127.0.0.1:0".parse().unwrap(),
            max_connections,
            online_mode: false,
            compression_threshold: None,
            ..Default::default()
        }
    }

    async fn start(max_connections: usize) -> (Arc<Server>, tokio::task::JoinHandle<Result<()>>) {
        let server = Server::bind(test_config(max_connections), Arc::new(OfflineIdentity), Arc::new(NoopEvents))
            .await
            .unwrap();
        let server = Arc::new(server);
        let runner = {
            let server = server.clone();
            tokio::spawn(async move { server.run().await })
        };
        (server, runner)
    }

    async fn connect(server: &Server) -> (FrameReader<OwnedReadHalf>, FrameWriter<OwnedWriteHalf>) {
        let stream = TcpStream::connect(server.local_addr().unwrap()).await.unwrap();
        let (read, write) = stream.into_split();
        (FrameReader::new(read, Direction::Clientbound), FrameWriter::new(write))
    }

    fn handshake(next_state: i32) -> Packet {
        Packet::from_def(&Handshake {
            protocol_version: PROTOCOL_VERSION,
            server_address: "127.0.0.1".into(),
            server_port: 25565,
            next_state,
        })
    }

    #[tokio::test]
    async fn test_status_over_tcp() {
        let (server, runner) = start(10).await;
        let (mut reader, mut writer) = connect(&server).await;

        writer.write_packet(&handshake(1)).await.unwrap();
        writer.write_packet(&Packet::from_def(&StatusRequest)).await.unwrap();
        let response = reader.read_frame().await.unwrap().unwrap();
        let response: StatusResponse = response.decode().unwrap();
        assert!(response.json.contains("\"protocol\":754"));

        server.shutdown();
        assert!(runner.await.unwrap().is_ok());
        assert_eq!(server.connection_count(), 0);
    }

    #[tokio::test]
    async fn test_connection_cap() {
        let (server, runner) = start(1).await;

        let (mut reader, mut writer) = connect(&server).await;
        writer.write_packet(&handshake(1)).await.unwrap();
        writer.write_packet(&Packet::from_def(&StatusRequest)).await.unwrap();
        assert!(reader.read_frame().await.unwrap().is_some());
        assert_eq!(server.connection_count(), 1);

        let (mut rejected, _writer) = connect(&server).await;
        assert!(rejected.read_frame().await.unwrap().is_none());

        server.shutdown();
        assert!(runner.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_broadcast_reaches_players() {
        let (server, runner) = start(10).await;
        let (mut reader, mut writer) = connect(&server).await;

        writer.write_packet(&handshake(2)).await.unwrap();
        writer
            .write_packet(&Packet::from_def(&LoginStart { username: "Steve".into() }))
            .await
            .unwrap();
        let success: LoginSuccess = reader.read_frame().await.unwrap().unwrap().decode().unwrap();
        assert_eq!(success.username, "Steve");
        let brand = reader.read_frame().await.unwrap().unwrap();
        assert_eq!(brand.id, PluginMessage::ID);

        assert_eq!(server.broadcast(&Packet::clientbound(0x0E, vec![5])), 1);
        let packet = reader.read_frame().await.unwrap().unwrap();
        assert_eq!(packet.id, 0x0E);

        server.shutdown();
        assert!(runner.await.unwrap().is_ok());
        assert!(reader.read_frame().await.unwrap().is_none());
        assert!(server.sessions().is_empty());
    }
}
