//! Chunk columns and the Chunk Data packet

use std::sync::Arc;

use basalt_protocol::codecs::{write_varint, Encode};
use basalt_protocol::packet::{Direction, PacketDef};
use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{RegistryError, Result};
use crate::registry::{BlockState, BlockStateRegistry};
use crate::section::{ChunkSection, SECTION_WIDTH};

/// Sections in a column (world height 256)
pub const SECTIONS_PER_CHUNK: usize = 16;

/// Biome entries sent with a full chunk (4×4×4 cells)
pub const BIOME_ENTRIES: usize = 1024;

/// Biome id for plains
pub const DEFAULT_BIOME: i32 = 1;

/// An NBT compound with an empty name and no children
const EMPTY_NBT_COMPOUND: [u8; 4] = [0x0A, 0x00, 0x00, 0x00];

/// A 16×256×16 column of sections
#[derive(Debug, Clone)]
pub struct ChunkColumn {
    pub x: i32,
    pub z: i32,
    registry: Arc<BlockStateRegistry>,
    sections: Vec<Option<ChunkSection>>,
}

impl ChunkColumn {
    pub fn new(x: i32, z: i32, registry: Arc<BlockStateRegistry>) -> Self {
        Self { x, z, registry, sections: vec![None; SECTIONS_PER_CHUNK] }
    }

    fn locate(x: i32, y: i32, z: i32) -> Result<(usize, usize, usize, usize)> {
        let width = SECTION_WIDTH as i32;
        if !(0..width).contains(&x)
            || !(0..width).contains(&z)
            || !(0..width * SECTIONS_PER_CHUNK as i32).contains(&y)
        {
            return Err(RegistryError::OutOfRange(x, y, z));
        }
        Ok((y as usize / SECTION_WIDTH, x as usize, y as usize % SECTION_WIDTH, z as usize))
    }

    /// Block at chunk-local coordinates
    pub fn get_block(&self, x: i32, y: i32, z: i32) -> Result<BlockState> {
        let (section, x, y, z) = Self::locate(x, y, z)?;
        match &self.sections[section] {
            Some(section) => section.get(x, y, z),
            None => Ok(self.registry.air()),
        }
    }

    /// Set a block at chunk-local coordinates
    pub fn set_block(&mut self, x: i32, y: i32, z: i32, state: BlockState) -> Result<()> {
        let (index, x, y, z) = Self::locate(x, y, z)?;
        let registry = &self.registry;
        let section = self.sections[index].get_or_insert_with(|| ChunkSection::new(registry.clone()));
        section.set(x, y, z, state)
    }

    /// Fill the layers `from_y..to_y` with one state
    pub fn fill_layers(&mut self, from_y: i32, to_y: i32, state: BlockState) -> Result<()> {
        for y in from_y..to_y {
            for z in 0..SECTION_WIDTH as i32 {
                for x in 0..SECTION_WIDTH as i32 {
                    self.set_block(x, y, z, state)?;
                }
            }
        }
        Ok(())
    }

    /// Build a full-chunk Chunk Data packet
    ///
    /// Sections that are absent or only air are left out of the bit mask.
    pub fn to_packet(&self) -> ChunkData {
        let mut primary_bit_mask = 0i32;
        let mut data = BytesMut::new();
        for (y, section) in self.sections.iter().enumerate() {
            if let Some(section) = section.as_ref().filter(|s| !s.is_empty()) {
                primary_bit_mask |= 1 << y;
                section.write(&mut data);
            }
        }

        ChunkData {
            x: self.x,
            z: self.z,
            full_chunk: true,
            primary_bit_mask,
            heightmaps: Bytes::from_static(&EMPTY_NBT_COMPOUND),
            biomes: Some(vec![DEFAULT_BIOME; BIOME_ENTRIES]),
            data: data.freeze(),
        }
    }
}

/// Chunk Data (Play 0x20)
///
/// # Format
/// - i32: chunk x
/// - i32: chunk z
/// - bool: full chunk
/// - VarInt: primary bit mask
/// - NBT: heightmaps
/// - full chunk only: VarInt count + VarInt biome ids
/// - VarInt + bytes: section data
/// - VarInt: block entity count (always 0)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkData {
    pub x: i32,
    pub z: i32,
    pub full_chunk: bool,
    pub primary_bit_mask: i32,
    pub heightmaps: Bytes,
    pub biomes: Option<Vec<i32>>,
    pub data: Bytes,
}

impl PacketDef for ChunkData {
    const ID: i32 = 0x20;
    const DIRECTION: Direction = Direction::Clientbound;
}

impl Encode for ChunkData {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_i32(self.x);
        buf.put_i32(self.z);
        buf.put_u8(self.full_chunk as u8);
        write_varint(buf, self.primary_bit_mask);
        buf.put_slice(&self.heightmaps);
        if self.full_chunk {
            let biomes = self.biomes.as_deref().unwrap_or(&[]);
            write_varint(buf, biomes.len() as i32);
            for biome in biomes {
                write_varint(buf, *biome);
            }
        }
        write_varint(buf, self.data.len() as i32);
        buf.put_slice(&self.data);
        write_varint(buf, 0);
    }
}
