//! Basalt - Minecraft 1.16.5 protocol server
//!
//! Main server binary

mod spawn;

use std::sync::Arc;

use anyhow::Context;
use basalt_config::ServerConfig;
use basalt_network::{NetworkConfig, OfflineIdentity, Server};
use basalt_world::BlockStateRegistry;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::spawn::{SpawnArea, FALLBACK_BLOCKS};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Basalt {} starting up", env!("CARGO_PKG_VERSION"));

    let config = match ServerConfig::load_default() {
        Ok(config) => {
            info!("Configuration loaded from {}", basalt_config::DEFAULT_CONFIG_PATH);
            config
        }
        Err(e) => {
            warn!("{}", e);
            warn!("Using default configuration (port 25565)");
            ServerConfig::default()
        }
    };
    config.display();

    let registry = match BlockStateRegistry::load(&config.block_registry) {
        Ok(registry) => registry,
        Err(e) => {
            warn!("Failed to load block registry {}: {}", config.block_registry.display(), e);
            warn!("Using the built-in registry of {} blocks", FALLBACK_BLOCKS.len());
            BlockStateRegistry::from_names(FALLBACK_BLOCKS).context("building fallback block registry")?
        }
    };
    let spawn = SpawnArea::flat(Arc::new(registry)).context("building spawn chunks")?;

    let network_config = NetworkConfig {
        bind_address: config.bind_address(),
        max_players: config.max_players,
        online_mode: config.online_mode,
        compression_threshold: config.compression_threshold(),
        keepalive_interval: config.keepalive_interval(),
        max_missed_keepalives: config.max_missed_keepalives,
        motd: config.motd.clone(),
        brand: config.brand.clone(),
        multiplayer_debug_mode: config.multiplayer_debug_mode,
        ..Default::default()
    };

    if network_config.online_mode {
        warn!("Online mode uses the offline identity provider: connections are encrypted, names are not verified");
    }

    let server = Server::bind(network_config, Arc::new(OfflineIdentity), Arc::new(spawn))
        .await
        .context("starting server")?;
    info!("Server is ready to accept connections on {}", server.local_addr()?);

    if let Err(e) = server.run().await {
        error!("Server error: {}", e);
        return Err(e.into());
    }

    info!("Server shut down");
    Ok(())
}
