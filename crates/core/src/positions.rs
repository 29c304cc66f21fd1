//! Block positions and their packed wire form

use serde::{Deserialize, Serialize};

/// Integer block coordinate
///
/// # Packed Format
/// ```text
/// | x: 26 bits | z: 26 bits | y: 12 bits |
/// ```
/// All three fields are two's-complement and sign-extended when unpacked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockPosition {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPosition {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Pack into the 64-bit wire representation
    pub fn pack(self) -> i64 {
        (((self.x as i64) & 0x3FF_FFFF) << 38)
            | (((self.z as i64) & 0x3FF_FFFF) << 12)
            | ((self.y as i64) & 0xFFF)
    }

    /// Unpack from the 64-bit wire representation
    pub fn unpack(value: i64) -> Self {
        Self {
            x: (value >> 38) as i32,
            y: ((value << 52) >> 52) as i32,
            z: ((value << 26) >> 38) as i32,
        }
    }

    /// Chunk column coordinates containing this block
    pub fn chunk(self) -> (i32, i32) {
        (self.x >> 4, self.z >> 4)
    }
}
