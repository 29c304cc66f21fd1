//! Block-state palettes
//!
//! A palette maps block states to the compact ids stored in a section's
//! data array. [`Palette::Global`] uses registry ids directly;
//! [`Palette::Linear`] keeps a small per-section table.
//!
//! A full linear palette answers `None` for an unseen state. That is not an
//! error: the owning section decides whether to widen or go global.

use std::sync::Arc;

use basalt_protocol::codecs::write_varint;
use bytes::BytesMut;

use crate::registry::{BlockState, BlockStateRegistry};

/// Fixed-capacity table of states in insertion order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinearPalette {
    bits: u8,
    entries: Vec<BlockState>,
}

impl LinearPalette {
    /// Empty palette holding up to `2^bits` states
    pub fn new(bits: u8) -> Self {
        Self { bits, entries: Vec::with_capacity(1 << bits) }
    }

    pub fn capacity(&self) -> usize {
        1 << self.bits
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity()
    }

    pub fn bits_per_entry(&self) -> u8 {
        self.bits
    }

    /// Id of `state`, appending it if there is room
    ///
    /// Returns `None` when the state is new and the table is full.
    pub fn id_from_state(&mut self, state: BlockState) -> Option<u32> {
        if let Some(id) = self.entries.iter().position(|s| *s == state) {
            return Some(id as u32);
        }
        if self.is_full() {
            return None;
        }
        self.entries.push(state);
        Some(self.entries.len() as u32 - 1)
    }

    pub fn state_from_index(&self, index: u32) -> Option<BlockState> {
        self.entries.get(index as usize).copied()
    }

    /// Same entries and ids with one more bit of capacity
    pub fn widened(&self) -> Self {
        let mut entries = Vec::with_capacity(1 << (self.bits + 1));
        entries.extend_from_slice(&self.entries);
        Self { bits: self.bits + 1, entries }
    }

    /// # Format
    /// - VarInt: entry count
    /// - VarInt per entry: global id, in insertion order
    pub fn write(&self, buf: &mut BytesMut) {
        write_varint(buf, self.entries.len() as i32);
        for state in &self.entries {
            write_varint(buf, state.id() as i32);
        }
    }
}

/// Palette strategy of one chunk section
#[derive(Debug, Clone)]
pub enum Palette {
    /// Registry ids used as-is; never full, nothing serialized
    Global(Arc<BlockStateRegistry>),

    Linear(LinearPalette),
}

impl Palette {
    pub fn linear(bits: u8) -> Self {
        Self::Linear(LinearPalette::new(bits))
    }

    pub fn global(registry: Arc<BlockStateRegistry>) -> Self {
        Self::Global(registry)
    }

    /// Compact id for `state`
    ///
    /// `None` from a linear palette means it is exhausted; from the global
    /// palette it means the state is not registered.
    pub fn id_from_state(&mut self, state: BlockState) -> Option<u32> {
        match self {
            Self::Global(registry) => registry.index_of(state),
            Self::Linear(linear) => linear.id_from_state(state),
        }
    }

    pub fn state_from_index(&self, index: u32) -> Option<BlockState> {
        match self {
            Self::Global(registry) => registry.state_at(index),
            Self::Linear(linear) => linear.state_from_index(index),
        }
    }

    pub fn is_full(&self) -> bool {
        match self {
            Self::Global(_) => false,
            Self::Linear(linear) => linear.is_full(),
        }
    }

    pub fn bits_per_entry(&self) -> u8 {
        match self {
            Self::Global(registry) => registry.bits_per_entry(),
            Self::Linear(linear) => linear.bits_per_entry(),
        }
    }

    pub fn is_global(&self) -> bool {
        matches!(self, Self::Global(_))
    }

    pub fn write(&self, buf: &mut BytesMut) {
        if let Self::Linear(linear) = self {
            linear.write(buf);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(id: u32) -> BlockState {
        BlockState::from_id(id)
    }

    #[test]
    fn test_same_state_same_id() {
        let mut palette = LinearPalette::new(4);
        let first = palette.id_from_state(state(7));
        let second = palette.id_from_state(state(7));
        assert_eq!(first, Some(0));
        assert_eq!(first, second);
        assert_eq!(palette.len(), 1);
    }

    #[test]
    fn test_fills_then_exhausts() {
        let bits = 4;
        let mut palette = LinearPalette::new(bits);
        for i in 0..(1u32 << bits) {
            assert_eq!(palette.id_from_state(state(100 + i)), Some(i));
        }
        assert!(palette.is_full());
        assert_eq!(palette.len(), palette.capacity());

        assert_eq!(palette.id_from_state(state(999)), None);
        // existing entries still resolve
        assert_eq!(palette.id_from_state(state(100)), Some(0));
        assert_eq!(palette.len(), 16);
    }

    #[test]
    fn test_widened_keeps_ids() {
        let mut palette = LinearPalette::new(1);
        palette.id_from_state(state(5));
        palette.id_from_state(state(6));
        assert!(palette.is_full());

        let mut wider = palette.widened();
        assert_eq!(wider.bits_per_entry(), 2);
        assert_eq!(wider.state_from_index(1), Some(state(6)));
        assert_eq!(wider.id_from_state(state(7)), Some(2));
    }

    #[test]
    fn test_write_insertion_order() {
        let mut palette = LinearPalette::new(4);
        palette.id_from_state(state(300));
        palette.id_from_state(state(1));

        let mut buf = BytesMut::new();
        palette.write(&mut buf);
        assert_eq!(&buf[..], &[0x02, 0xAC, 0x02, 0x01]);
    }

    #[test]
    fn test_global_palette() {
        let registry =
            Arc::new(BlockStateRegistry::from_names(&["minecraft:air", "minecraft:stone", "minecraft:dirt"]).unwrap());
        let mut palette = Palette::global(registry);

        assert!(!palette.is_full());
        assert_eq!(palette.id_from_state(state(2)), Some(2));
        assert_eq!(palette.state_from_index(1), Some(state(1)));
        assert_eq!(palette.id_from_state(state(3)), None);
        assert_eq!(palette.bits_per_entry(), 2);

        let mut buf = BytesMut::new();
        palette.write(&mut buf);
        assert!(buf.is_empty());
    }
}
