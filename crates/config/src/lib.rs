//! Basalt Configuration Management
//!
//! Loads the server configuration from a `server.properties` style file:
//! one `key = value` per line, `#` comments, unknown keys ignored and
//! malformed values falling back to their defaults.

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use basalt_core::BasaltError;

/// Default configuration file, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "server.properties";

/// Errors raised while loading the configuration
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    FileError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<ConfigError> for BasaltError {
    fn from(e: ConfigError) -> Self {
        BasaltError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Complete server configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// Interface to bind (from "server-ip"; empty binds every interface)
    pub server_ip: String,
    /// TCP port (from "server-port", default: 25565)
    pub server_port: u16,
    /// Player count advertised in the server list (from "max-players")
    pub max_players: u32,
    /// Server list description (from "motd")
    pub motd: String,
    /// Authenticate players with the key exchange (from "online-mode")
    pub online_mode: bool,
    /// Compression threshold in bytes (from "network-compression-threshold"; negative disables)
    pub network_compression_threshold: i32,
    /// Unanswered keep-alives before a player is dropped (from "max-missed-keepalives")
    pub max_missed_keepalives: u32,
    /// Keep-alive period (from "keepalive-interval-ms")
    pub keepalive_interval_ms: u64,
    /// Replace player names with `Player<n>` (from "multiplayer-debug-mode")
    pub multiplayer_debug_mode: bool,
    /// Block report JSON (from "block-registry")
    pub block_registry: PathBuf,
    /// Server brand (from "brand")
    pub brand: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server_ip: String::new(),
            server_port: 25565,
            max_players: 20,
            motd: "A Basalt server".into(),
            online_mode: true,
            network_compression_threshold: 256,
            max_missed_keepalives: 5,
            keepalive_interval_ms: 10_000,
            multiplayer_debug_mode: false,
            block_registry: PathBuf::from("blocks.json"),
            brand: "basalt".into(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from a properties file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::FileError {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::parse(&content)?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load `server.properties` from the working directory
    pub fn load_default() -> Result<Self> {
        Self::load_from_file(DEFAULT_CONFIG_PATH)
    }

    /// Parse properties content
    pub fn parse(content: &str) -> Result<Self> {
        let mut config = Self::default();

        for (index, line) in content.lines().enumerate() {
            let line = line.trim();

            // Skip comments and empty lines
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                tracing::warn!("Ignoring config line {}: {:?}", index + 1, line);
                continue;
            };
            config.parse_option(key.trim(), value.trim());
        }

        Ok(config)
    }

    fn parse_option(&mut self, key: &str, value: &str) {
        let defaults = Self::default();
        match key {
            "server-ip" => self.server_ip = value.into(),
            "server-port" => {
                self.server_port = value.parse().unwrap_or(defaults.server_port);
            }
            "max-players" => {
                self.max_players = value.parse().unwrap_or(defaults.max_players);
            }
            "motd" => self.motd = value.into(),
            "online-mode" => {
                self.online_mode = value.parse().unwrap_or(defaults.online_mode);
            }
            "network-compression-threshold" => {
                self.network_compression_threshold =
                    value.parse().unwrap_or(defaults.network_compression_threshold);
            }
            "max-missed-keepalives" => {
                self.max_missed_keepalives = value.parse().unwrap_or(defaults.max_missed_keepalives);
            }
            "keepalive-interval-ms" => {
                self.keepalive_interval_ms = value.parse().unwrap_or(defaults.keepalive_interval_ms);
            }
            "multiplayer-debug-mode" => {
                self.multiplayer_debug_mode = value.parse().unwrap_or(defaults.multiplayer_debug_mode);
            }
            "block-registry" => self.block_registry = PathBuf::from(value),
            "brand" => self.brand = value.into(),
            _ => {
                tracing::debug!("Unknown config option: {} = {}", key, value);
            }
        }
    }

    /// Get the bind address for the TCP listener
    pub fn bind_address(&self) -> SocketAddr {
        let ip = if self.server_ip.is_empty() { "0.0.0.0" } else { &self.server_ip };

        format!("{}:{}", ip, self.server_port)
            .parse()
            .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], self.server_port)))
    }

    /// Compression threshold, `None` when disabled
    pub fn compression_threshold(&self) -> Option<usize> {
        usize::try_from(self.network_compression_threshold).ok()
    }

    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_millis(self.keepalive_interval_ms)
    }

    /// Display configuration summary
    pub fn display(&self) {
        tracing::info!("Server configuration:");
        tracing::info!("  Bind: {}", self.bind_address());
        tracing::info!("  MOTD: {}", self.motd);
        tracing::info!("  Max Players: {}", self.max_players);
        tracing::info!("  Online Mode: {}", self.online_mode);
        match self.compression_threshold() {
            Some(threshold) => tracing::info!("  Compression: {} bytes", threshold),
            None => tracing::info!("  Compression: disabled"),
        }
        tracing::info!(
            "  Keep-alive: every {} ms, {} missed allowed",
            self.keepalive_interval_ms,
            self.max_missed_keepalives
        );
        if self.multiplayer_debug_mode {
            tracing::info!("  Multiplayer debug mode: player names are randomized");
        }
        tracing::info!("  Block registry: {}", self.block_registry.display());
        tracing::info!("  Brand: {}", self.brand);
    }
}
