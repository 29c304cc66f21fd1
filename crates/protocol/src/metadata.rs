//! Entity metadata records
//!
//! A metadata blob is a list of `(u8 index, varint type, value)` entries
//! closed by the index byte `0xFF`.

use basalt_core::{BasaltError, BlockPosition, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::chat::ChatMessage;
use crate::codecs::*;

/// Index byte that ends a metadata list
pub const METADATA_END: u8 = 0xFF;

/// A single typed metadata value
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    Byte(i8),
    VarInt(i32),
    Float(f32),
    String(String),
    Chat(ChatMessage),
    OptChat(Option<ChatMessage>),
    Boolean(bool),
    Position(BlockPosition),
}

impl MetadataValue {
    /// Wire type tag
    pub fn type_id(&self) -> i32 {
        match self {
            Self::Byte(_) => 0,
            Self::VarInt(_) => 1,
            Self::Float(_) => 2,
            Self::String(_) => 3,
            Self::Chat(_) => 4,
            Self::OptChat(_) => 5,
            Self::Boolean(_) => 7,
            Self::Position(_) => 9,
        }
    }

    fn write_value(&self, buf: &mut BytesMut) {
        match self {
            Self::Byte(v) => buf.put_i8(*v),
            Self::VarInt(v) => write_varint(buf, *v),
            Self::Float(v) => buf.put_f32(*v),
            Self::String(v) => write_string(buf, v),
            Self::Chat(v) => write_chat(buf, v),
            Self::OptChat(v) => write_optional_chat(buf, v.as_ref()),
            Self::Boolean(v) => write_bool(buf, *v),
            Self::Position(v) => write_position(buf, *v),
        }
    }

    fn read_value(type_id: i32, buf: &mut impl Buf) -> Result<Self> {
        Ok(match type_id {
            0 => Self::Byte(read_i8(buf)?),
            1 => Self::VarInt(read_varint(buf)?),
            2 => Self::Float(read_f32(buf)?),
            3 => Self::String(read_string(buf, MAX_STRING_LEN)?),
            4 => Self::Chat(read_chat(buf)?),
            5 => Self::OptChat(read_optional_chat(buf)?),
            7 => Self::Boolean(read_bool(buf)?),
            9 => Self::Position(read_position(buf)?),
            other => {
                return Err(BasaltError::FrameCorrupt(format!(
                    "Unsupported metadata type: {}",
                    other
                )))
            }
        })
    }
}

/// Ordered metadata entries for one entity
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityMetadata {
    entries: Vec<(u8, MetadataValue)>,
}

impl EntityMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `index`, replacing any previous value at the same index
    pub fn set(&mut self, index: u8, value: MetadataValue) -> &mut Self {
        debug_assert!(index != METADATA_END);
        match self.entries.iter_mut().find(|(i, _)| *i == index) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((index, value)),
        }
        self
    }

    pub fn get(&self, index: u8) -> Option<&MetadataValue> {
        self.entries.iter().find(|(i, _)| *i == index).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Encode for EntityMetadata {
    fn encode(&self, buf: &mut BytesMut) {
        for (index, value) in &self.entries {
            buf.put_u8(*index);
            write_varint(buf, value.type_id());
            value.write_value(buf);
        }
        buf.put_u8(METADATA_END);
    }
}

impl Decode for EntityMetadata {
    fn decode(buf: &mut Bytes) -> Result<Self> {
        let mut metadata = Self::new();
        loop {
            let index = read_u8(buf)?;
            if index == METADATA_END {
                return Ok(metadata);
            }
            let type_id = read_varint(buf)?;
            let value = MetadataValue::read_value(type_id, buf)?;
            metadata.entries.push((index, value));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_metadata_is_terminator() {
        let mut buf = BytesMut::new();
        EntityMetadata::new().encode(&mut buf);
        assert_eq!(&buf[..], &[METADATA_END]);
    }

    #[test]
    fn test_metadata_roundtrip() {
        let mut metadata = EntityMetadata::new();
        metadata
            .set(0, MetadataValue::Byte(0x20))
            .set(2, MetadataValue::OptChat(Some(ChatMessage::simple("Steve"))))
            .set(3, MetadataValue::Boolean(true))
            .set(7, MetadataValue::Position(BlockPosition::new(1, -2, 3)))
            .set(8, MetadataValue::Float(20.0));

        let mut buf = BytesMut::new();
        metadata.encode(&mut buf);
        let decoded = EntityMetadata::decode(&mut buf.freeze()).unwrap();
        assert_eq!(decoded, metadata);
    }

    #[test]
    fn test_set_replaces() {
        let mut metadata = EntityMetadata::new();
        metadata.set(1, MetadataValue::VarInt(300)).set(1, MetadataValue::VarInt(5));
        assert_eq!(metadata.len(), 1);
        assert_eq!(metadata.get(1), Some(&MetadataValue::VarInt(5)));
    }

    #[test]
    fn test_missing_terminator() {
        let mut buf = BytesMut::new();
        buf.put_u8(0);
        write_varint(&mut buf, 0);
        buf.put_i8(1);
        assert!(EntityMetadata::decode(&mut buf.freeze()).is_err());
    }

    #[test]
    fn test_unknown_type() {
        let mut buf = BytesMut::new();
        buf.put_u8(0);
        write_varint(&mut buf, 6);
        assert!(matches!(
            EntityMetadata::decode(&mut buf.freeze()),
            Err(BasaltError::FrameCorrupt(_))
        ));
    }
}
