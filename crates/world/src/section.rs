//! Chunk sections
//!
//! A 16×16×16 cube of block states. The section owns palette promotion:
//! it starts with a 4-bit linear palette, widens one bit whenever the
//! palette runs out of room and switches to the global palette past 8 bits.

use std::sync::Arc;

use basalt_protocol::codecs::write_varint;
use bytes::{BufMut, BytesMut};

use crate::error::{RegistryError, Result};
use crate::palette::{LinearPalette, Palette};
use crate::registry::{BlockState, BlockStateRegistry};

/// Edge length of a section
pub const SECTION_WIDTH: usize = 16;

/// Blocks in one section
pub const SECTION_VOLUME: usize = SECTION_WIDTH * SECTION_WIDTH * SECTION_WIDTH;

/// Bits per entry of a fresh section
pub const MIN_LINEAR_BITS: u8 = 4;

/// Widest linear palette before switching to global
pub const MAX_LINEAR_BITS: u8 = 8;

#[inline]
fn block_index(x: usize, y: usize, z: usize) -> usize {
    (y * SECTION_WIDTH + z) * SECTION_WIDTH + x
}

/// Chunk Section
#[derive(Debug, Clone)]
pub struct ChunkSection {
    registry: Arc<BlockStateRegistry>,
    palette: Palette,
    /// Palette ids in YZX order
    ids: Vec<u32>,
    non_air: u16,
}

impl ChunkSection {
    /// A section filled with air
    pub fn new(registry: Arc<BlockStateRegistry>) -> Self {
        let mut palette = LinearPalette::new(MIN_LINEAR_BITS);
        let air_id = palette.id_from_state(registry.air()).unwrap_or(0);

        Self {
            registry,
            palette: Palette::Linear(palette),
            ids: vec![air_id; SECTION_VOLUME],
            non_air: 0,
        }
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn bits_per_entry(&self) -> u8 {
        self.palette.bits_per_entry()
    }

    pub fn non_air_count(&self) -> u16 {
        self.non_air
    }

    pub fn is_empty(&self) -> bool {
        self.non_air == 0
    }

    fn check(x: usize, y: usize, z: usize) -> Result<usize> {
        if x >= SECTION_WIDTH || y >= SECTION_WIDTH || z >= SECTION_WIDTH {
            return Err(RegistryError::OutOfRange(x as i32, y as i32, z as i32));
        }
        Ok(block_index(x, y, z))
    }

    pub fn get(&self, x: usize, y: usize, z: usize) -> Result<BlockState> {
        let index = Self::check(x, y, z)?;
        let id = self.ids[index];
        self.palette.state_from_index(id).ok_or(RegistryError::UnknownState(id))
    }

    pub fn set(&mut self, x: usize, y: usize, z: usize, state: BlockState) -> Result<()> {
        let index = Self::check(x, y, z)?;
        if !self.registry.contains(state) {
            return Err(RegistryError::UnknownState(state.id()));
        }

        let id = match self.palette.id_from_state(state) {
            Some(id) => id,
            None => {
                self.grow()?;
                self.palette
                    .id_from_state(state)
                    .ok_or(RegistryError::UnknownState(state.id()))?
            }
        };

        let previous = self.palette.state_from_index(self.ids[index]);
        let was_air = previous.map_or(true, |s| self.registry.is_air(s));
        let is_air = self.registry.is_air(state);
        match (was_air, is_air) {
            (true, false) => self.non_air += 1,
            (false, true) => self.non_air -= 1,
            _ => {}
        }

        self.ids[index] = id;
        Ok(())
    }

    /// Make room for one more distinct state
    fn grow(&mut self) -> Result<()> {
        let Palette::Linear(linear) = &self.palette else {
            return Ok(());
        };

        if linear.bits_per_entry() < MAX_LINEAR_BITS {
            let wider = linear.widened();
            tracing::trace!("Widening section palette to {} bits", wider.bits_per_entry());
            self.palette = Palette::Linear(wider);
            return Ok(());
        }

        // re-index onto registry ids
        let mut remapped = Vec::with_capacity(SECTION_VOLUME);
        for &id in &self.ids {
            let state = linear.state_from_index(id).ok_or(RegistryError::UnknownState(id))?;
            remapped.push(state.id());
        }
        tracing::trace!(
            "Promoting section palette to global ({} bits)",
            self.registry.bits_per_entry()
        );
        self.ids = remapped;
        self.palette = Palette::global(self.registry.clone());
        Ok(())
    }

    /// # Format
    /// - i16: non-air block count
    /// - u8: bits per entry
    /// - palette (linear only)
    /// - VarInt: number of longs
    /// - i64 array: ids packed low bits first, never spanning two longs
    pub fn write(&self, buf: &mut BytesMut) {
        let bits = self.bits_per_entry() as usize;
        buf.put_i16(self.non_air as i16);
        buf.put_u8(bits as u8);
        self.palette.write(buf);

        let data = pack_ids(&self.ids, bits);
        write_varint(buf, data.len() as i32);
        for long in data {
            buf.put_i64(long as i64);
        }
    }
}

/// Pack `ids` into longs with `bits` bits each
fn pack_ids(ids: &[u32], bits: usize) -> Vec<u64> {
    let per_long = 64 / bits;
    let mask = (1u64 << bits) - 1;
    let mut data = vec![0u64; ids.len().div_ceil(per_long)];
    for (i, &id) in ids.iter().enumerate() {
        let shift = (i % per_long) * bits;
        data[i / per_long] |= (id as u64 & mask) << shift;
    }
    data
}
