//! # Basalt Networking Layer
//!
//! Tokio-based connection engine for protocol 754 clients.
//!
//! ## Modules
//!
//! - [`config`] - Runtime configuration for the engine
//! - [`connection`] - Per-connection state machine and teardown
//! - [`queue`] - Outbound queue and its drain task
//! - [`session`] - Session state shared by a connection's tasks
//! - [`keepalive`] - Keep-alive accounting
//! - [`registry`] - Logged-in sessions by UUID
//! - [`identity`] - Identity collaborator and offline profiles
//! - [`events`] - Join and leave hooks
//! - [`handlers`] - Play packet handler registry
//! - [`server`] - TCP accept loop

pub mod config;
pub mod connection;
pub mod events;
pub mod handlers;
pub mod identity;
pub mod keepalive;
pub mod queue;
pub mod registry;
pub mod server;
pub mod session;

// Re-export commonly used items
pub use config::NetworkConfig;
pub use connection::{serve, ConnectionContext};
pub use events::{NoopEvents, SessionEvents};
pub use handlers::{HandlerFunction, HandlerRegistry, PlayContext};
pub use identity::{offline_uuid, GameProfile, IdentityProvider, OfflineIdentity, ProfileProperty};
pub use keepalive::{KeepAlive, KeepAliveTick};
pub use queue::{Outbound, OutboundQueue, PacketSender};
pub use registry::OnlineSessionRegistry;
pub use server::Server;
pub use session::{SessionHandle, SessionShared};
