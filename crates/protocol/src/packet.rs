//! Packet model
//!
//! A [`Packet`] is the raw unit moved between the frame layer and the
//! connection state machine. Typed packet structs implement [`PacketDef`]
//! and convert to and from a [`Packet`] without runtime reflection.

use basalt_core::{BasaltError, Result};
use bytes::{Bytes, BytesMut};

use crate::codecs::{Decode, Encode};

/// Which peer sent a packet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Serverbound,
    Clientbound,
}

/// An immutable `(id, payload)` pair
///
/// Equality compares id and payload only.
#[derive(Debug, Clone)]
pub struct Packet {
    pub id: i32,
    pub payload: Bytes,
    pub direction: Direction,
}

impl PartialEq for Packet {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.payload == other.payload
    }
}

impl Eq for Packet {}

impl Packet {
    pub fn new(id: i32, payload: impl Into<Bytes>, direction: Direction) -> Self {
        Self { id, payload: payload.into(), direction }
    }

    pub fn clientbound(id: i32, payload: impl Into<Bytes>) -> Self {
        Self::new(id, payload, Direction::Clientbound)
    }

    pub fn serverbound(id: i32, payload: impl Into<Bytes>) -> Self {
        Self::new(id, payload, Direction::Serverbound)
    }

    /// Build a clientbound packet from a typed definition
    pub fn from_def<T: PacketDef + Encode>(def: &T) -> Self {
        let mut buf = BytesMut::new();
        def.encode(&mut buf);
        Self::new(T::ID, buf.freeze(), T::DIRECTION)
    }

    /// Decode the payload as `T`
    ///
    /// The id must match and the payload must be consumed completely.
    pub fn decode<T: PacketDef + Decode>(&self) -> Result<T> {
        if self.id != T::ID {
            return Err(BasaltError::ProtocolViolation(format!(
                "Expected packet 0x{:02X}, got 0x{:02X}",
                T::ID,
                self.id
            )));
        }
        let mut payload = self.payload.clone();
        let value = T::decode(&mut payload)?;
        if !payload.is_empty() {
            return Err(BasaltError::ProtocolViolation(format!(
                "{} trailing bytes after packet 0x{:02X}",
                payload.len(),
                self.id
            )));
        }
        Ok(value)
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Static identity of a typed packet
pub trait PacketDef {
    const ID: i32;
    const DIRECTION: Direction;
}
