//! # Network Configuration
//!
//! Runtime knobs consumed by the connection engine.
//!
//! # Example
//!
//! ```rust
//! use basalt_network::NetworkConfig;
//! use std::time::Duration;
//!
//! let config = NetworkConfig {
//!     bind_address: "127.0.0.1:25565".parse().unwrap(),
//!     online_mode: false,
//!     keepalive_interval: Duration::from_secs(5),
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! ```

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Connection engine configuration
///
/// # Default Values
/// - Port 25565 on all interfaces
/// - 1000 max connections, 20 max players
/// - Online mode with compression above 256 bytes
/// - Keep-alive every 10 seconds, 5 missed challenges tolerated
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Address and port to bind the TCP listener to
    pub bind_address: SocketAddr,

    /// Maximum number of concurrent sockets
    ///
    /// Sockets accepted beyond this are closed immediately.
    pub max_connections: usize,

    /// Player count advertised in the server list
    pub max_players: u32,

    /// Whether logins go through the RSA key exchange and identity lookup
    pub online_mode: bool,

    /// Frames with a body of at least this many bytes are compressed
    ///
    /// `None` never negotiates compression.
    pub compression_threshold: Option<usize>,

    /// Time between keep-alive challenges in Play
    pub keepalive_interval: Duration,

    /// Unanswered challenges tolerated before the connection is dropped
    pub max_missed_keepalives: u32,

    /// Server list description
    pub motd: String,

    /// Announced on `minecraft:brand` after login
    pub brand: String,

    /// Replace every requested username with a random `Player<n>`
    pub multiplayer_debug_mode: bool,

    /// Size of the buffered reader on each socket
    pub read_buffer_size: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 25565)),
            max_connections: 1000,
            max_players: 20,
            online_mode: true,
            compression_threshold: Some(256),
            keepalive_interval: Duration::from_secs(10),
            max_missed_keepalives: 5,
            motd: "A Basalt server".to_string(),
            brand: "basalt".to_string(),
            multiplayer_debug_mode: false,
            read_buffer_size: 8192,
        }
    }
}

impl NetworkConfig {
    /// Validate the configuration
    ///
    /// # Checks
    /// - `max_connections` must be > 0
    /// - `keepalive_interval` must be non-zero
    /// - `max_missed_keepalives` must be > 0
    /// - `read_buffer_size` must be >= 1024
    pub fn validate(&self) -> Result<(), String> {
        if self.max_connections == 0 {
            return Err("max_connections must be > 0".to_string());
        }

        if self.keepalive_interval.is_zero() {
            return Err("keepalive_interval must be > 0".to_string());
        }

        if self.max_missed_keepalives == 0 {
            return Err("max_missed_keepalives must be > 0".to_string());
        }

        if self.read_buffer_size < 1024 {
            return Err("read_buffer_size must be >= 1024".to_string());
        }

        if !self.read_buffer_size.is_power_of_two() {
            tracing::warn!("read_buffer_size is not a power of 2, this may reduce performance");
        }

        if !self.online_mode {
            tracing::warn!("Online mode is disabled, player identities are not verified");
        }

        Ok(())
    }
}
