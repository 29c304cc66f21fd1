//! Spawn area sent to every player that joins

use std::sync::Arc;

use async_trait::async_trait;
use basalt_core::{BasaltError, Result};
use basalt_network::{SessionEvents, SessionHandle};
use basalt_protocol::Packet;
use basalt_world::{BlockStateRegistry, ChunkColumn};

/// Chunks in each direction around the origin
const SPAWN_RADIUS: i32 = 1;

/// Fallback block names when no block report is available
pub const FALLBACK_BLOCKS: &[&str] = &[
    "minecraft:air",
    "minecraft:stone",
    "minecraft:grass_block",
    "minecraft:dirt",
    "minecraft:bedrock",
];

/// Join and leave hooks of the standalone server
///
/// The flat spawn chunks are encoded once and queued for every joining
/// player.
#[derive(Debug)]
pub struct SpawnArea {
    chunks: Vec<Packet>,
}

impl SpawnArea {
    /// Build a flat spawn: bedrock, two layers of dirt, grass on top
    pub fn flat(registry: Arc<BlockStateRegistry>) -> Result<Self> {
        let block = |name: &str| {
            registry
                .default_state(name)
                .ok_or_else(|| BasaltError::NotFound(format!("Block {} is not in the registry", name)))
        };
        let layers = [
            (0, 1, block("minecraft:bedrock")?),
            (1, 3, block("minecraft:dirt")?),
            (3, 4, block("minecraft:grass_block")?),
        ];

        let mut chunks = Vec::new();
        for x in -SPAWN_RADIUS..=SPAWN_RADIUS {
            for z in -SPAWN_RADIUS..=SPAWN_RADIUS {
                let mut column = ChunkColumn::new(x, z, registry.clone());
                for (from_y, to_y, state) in layers {
                    column.fill_layers(from_y, to_y, state)?;
                }
                chunks.push(Packet::from_def(&column.to_packet()));
            }
        }

        tracing::debug!("Prepared {} spawn chunks", chunks.len());
        Ok(Self { chunks })
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }
}

#[async_trait]
impl SessionEvents for SpawnArea {
    async fn on_join(&self, session: &SessionHandle) -> Result<()> {
        let name = session.username().unwrap_or_default();
        tracing::info!("{} joined the game", name);
        for chunk in &self.chunks {
            session.send(chunk.clone());
        }
        Ok(())
    }

    fn on_leave(&self, session: &SessionHandle) {
        let name = session.username().unwrap_or_default();
        tracing::info!("{} left the game", name);
    }
}
