//! Binary stream codecs
//!
//! Primitive and composite value encodings shared by every packet.
//! All fixed-width values are big-endian. Readers never panic on short input:
//! running out of bytes is reported as [`BasaltError::FrameCorrupt`].

use basalt_core::{BasaltError, BlockPosition, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use uuid::Uuid;

use crate::chat::ChatMessage;

/// Longest legal VarInt encoding
pub const MAX_VARINT_LEN: usize = 5;

/// Longest legal VarLong encoding
pub const MAX_VARLONG_LEN: usize = 10;

/// Default maximum string length, in characters
pub const MAX_STRING_LEN: usize = 32767;

/// Trait for types with a fixed binary encoding
pub trait Encode {
    fn encode(&self, buf: &mut BytesMut);
}

/// Trait for types that can be read back from their binary encoding
pub trait Decode: Sized {
    fn decode(buf: &mut Bytes) -> Result<Self>;
}

#[inline]
fn ensure(buf: &impl Buf, len: usize, what: &str) -> Result<()> {
    if buf.remaining() < len {
        return Err(BasaltError::FrameCorrupt(format!(
            "Not enough bytes for {}: need {}, have {}",
            what,
            len,
            buf.remaining()
        )));
    }
    Ok(())
}

/// Number of bytes `val` occupies as a VarInt
#[inline]
pub fn varint_len(val: i32) -> usize {
    let val = val as u32;
    match val {
        0..=0x7F => 1,
        0x80..=0x3FFF => 2,
        0x4000..=0x1F_FFFF => 3,
        0x20_0000..=0xFFF_FFFF => 4,
        _ => 5,
    }
}

/// Write a VarInt
///
/// # Format
/// 7 payload bits per byte, least significant group first, high bit set on
/// every byte except the last. Always the shortest encoding; negative values
/// take 5 bytes.
#[inline]
pub fn write_varint(buf: &mut BytesMut, val: i32) {
    let mut val = val as u32;
    loop {
        if val & !0x7F == 0 {
            buf.put_u8(val as u8);
            return;
        }
        buf.put_u8((val & 0x7F) as u8 | 0x80);
        val >>= 7;
    }
}

/// Read a VarInt
///
/// Fails if the input ends mid-value or a sixth byte would be needed.
#[inline]
pub fn read_varint(buf: &mut impl Buf) -> Result<i32> {
    let mut val: u32 = 0;
    for i in 0..MAX_VARINT_LEN {
        if !buf.has_remaining() {
            return Err(BasaltError::FrameCorrupt("Truncated VarInt".into()));
        }
        let byte = buf.get_u8();
        val |= ((byte & 0x7F) as u32) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(val as i32);
        }
    }
    Err(BasaltError::FrameCorrupt("VarInt is longer than 5 bytes".into()))
}

/// Write a VarLong (same scheme as VarInt, up to 10 bytes)
#[inline]
pub fn write_varlong(buf: &mut BytesMut, val: i64) {
    let mut val = val as u64;
    loop {
        if val & !0x7F == 0 {
            buf.put_u8(val as u8);
            return;
        }
        buf.put_u8((val & 0x7F) as u8 | 0x80);
        val >>= 7;
    }
}

/// Read a VarLong
#[inline]
pub fn read_varlong(buf: &mut impl Buf) -> Result<i64> {
    let mut val: u64 = 0;
    for i in 0..MAX_VARLONG_LEN {
        if !buf.has_remaining() {
            return Err(BasaltError::FrameCorrupt("Truncated VarLong".into()));
        }
        let byte = buf.get_u8();
        val |= ((byte & 0x7F) as u64) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(val as i64);
        }
    }
    Err(BasaltError::FrameCorrupt("VarLong is longer than 10 bytes".into()))
}

/// Write a length-prefixed UTF-8 string
///
/// # Format
/// - VarInt: byte length
/// - UTF-8 bytes (not null-terminated)
#[inline]
pub fn write_string(buf: &mut BytesMut, val: &str) {
    write_varint(buf, val.len() as i32);
    buf.put_slice(val.as_bytes());
}

/// Read a length-prefixed UTF-8 string of at most `max_chars` characters
pub fn read_string(buf: &mut impl Buf, max_chars: usize) -> Result<String> {
    let len = read_varint(buf)?;
    if len < 0 {
        return Err(BasaltError::FrameCorrupt(format!("Negative string length: {}", len)));
    }
    let len = len as usize;
    if len > max_chars * 4 {
        return Err(BasaltError::FrameCorrupt(format!(
            "String byte length {} exceeds limit for {} characters",
            len, max_chars
        )));
    }
    ensure(buf, len, "string")?;

    let bytes = buf.copy_to_bytes(len);
    let val = String::from_utf8(bytes.to_vec())
        .map_err(|e| BasaltError::FrameCorrupt(format!("Invalid UTF-8: {}", e)))?;

    if val.chars().count() > max_chars {
        return Err(BasaltError::FrameCorrupt(format!(
            "String longer than {} characters",
            max_chars
        )));
    }
    Ok(val)
}

/// Write a VarInt-prefixed byte array
#[inline]
pub fn write_byte_array(buf: &mut BytesMut, val: &[u8]) {
    write_varint(buf, val.len() as i32);
    buf.put_slice(val);
}

/// Read a VarInt-prefixed byte array of at most `max_len` bytes
pub fn read_byte_array(buf: &mut impl Buf, max_len: usize) -> Result<Bytes> {
    let len = read_varint(buf)?;
    if len < 0 || len as usize > max_len {
        return Err(BasaltError::FrameCorrupt(format!(
            "Byte array length {} outside 0..={}",
            len, max_len
        )));
    }
    let len = len as usize;
    ensure(buf, len, "byte array")?;
    Ok(buf.copy_to_bytes(len))
}

#[inline]
pub fn read_bool(buf: &mut impl Buf) -> Result<bool> {
    ensure(buf, 1, "bool")?;
    match buf.get_u8() {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(BasaltError::FrameCorrupt(format!("Invalid bool byte: {}", other))),
    }
}

#[inline]
pub fn write_bool(buf: &mut BytesMut, val: bool) {
    buf.put_u8(val as u8);
}

#[inline]
pub fn read_u8(buf: &mut impl Buf) -> Result<u8> {
    ensure(buf, 1, "u8")?;
    Ok(buf.get_u8())
}

#[inline]
pub fn read_i8(buf: &mut impl Buf) -> Result<i8> {
    ensure(buf, 1, "i8")?;
    Ok(buf.get_i8())
}

#[inline]
pub fn read_u16(buf: &mut impl Buf) -> Result<u16> {
    ensure(buf, 2, "u16")?;
    Ok(buf.get_u16())
}

#[inline]
pub fn read_i16(buf: &mut impl Buf) -> Result<i16> {
    ensure(buf, 2, "i16")?;
    Ok(buf.get_i16())
}

#[inline]
pub fn read_i32(buf: &mut impl Buf) -> Result<i32> {
    ensure(buf, 4, "i32")?;
    Ok(buf.get_i32())
}

#[inline]
pub fn read_i64(buf: &mut impl Buf) -> Result<i64> {
    ensure(buf, 8, "i64")?;
    Ok(buf.get_i64())
}

#[inline]
pub fn read_f32(buf: &mut impl Buf) -> Result<f32> {
    ensure(buf, 4, "f32")?;
    Ok(buf.get_f32())
}

#[inline]
pub fn read_f64(buf: &mut impl Buf) -> Result<f64> {
    ensure(buf, 8, "f64")?;
    Ok(buf.get_f64())
}

/// Write a UUID as two big-endian 64-bit halves
#[inline]
pub fn write_uuid(buf: &mut BytesMut, val: &Uuid) {
    buf.put_u128(val.as_u128());
}

#[inline]
pub fn read_uuid(buf: &mut impl Buf) -> Result<Uuid> {
    ensure(buf, 16, "UUID")?;
    Ok(Uuid::from_u128(buf.get_u128()))
}

/// Write a packed block position (see [`BlockPosition::pack`])
#[inline]
pub fn write_position(buf: &mut BytesMut, val: BlockPosition) {
    buf.put_i64(val.pack());
}

#[inline]
pub fn read_position(buf: &mut impl Buf) -> Result<BlockPosition> {
    Ok(BlockPosition::unpack(read_i64(buf)?))
}

/// Write a chat component as its JSON string
pub fn write_chat(buf: &mut BytesMut, val: &ChatMessage) {
    write_string(buf, &val.to_json());
}

pub fn read_chat(buf: &mut impl Buf) -> Result<ChatMessage> {
    let json = read_string(buf, MAX_STRING_LEN)?;
    ChatMessage::from_json(&json)
}

/// Write a presence-flagged chat component
///
/// # Format
/// - bool: present
/// - chat JSON (only when present)
pub fn write_optional_chat(buf: &mut BytesMut, val: Option<&ChatMessage>) {
    write_bool(buf, val.is_some());
    if let Some(chat) = val {
        write_chat(buf, chat);
    }
}

pub fn read_optional_chat(buf: &mut impl Buf) -> Result<Option<ChatMessage>> {
    if read_bool(buf)? {
        Ok(Some(read_chat(buf)?))
    } else {
        Ok(None)
    }
}

/// Consume everything left in the buffer
#[inline]
pub fn read_remaining(buf: &mut impl Buf) -> Bytes {
    let len = buf.remaining();
    buf.copy_to_bytes(len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_varint_roundtrip() {
        let test_cases = vec![0i32, 1, 127, 128, 255, 25565, 2_097_151, 2_097_152, i32::MAX, -1, i32::MIN];

        for val in test_cases {
            let mut buf = BytesMut::new();
            write_varint(&mut buf, val);
            assert_eq!(buf.len(), varint_len(val), "Length mismatch for {}", val);
            let decoded = read_varint(&mut buf.freeze()).unwrap();
            assert_eq!(val, decoded, "Failed for {}", val);
        }
    }

    #[test]
    fn test_varint_canonical_lengths() {
        let boundaries = [
            (0, 1),
            (127, 1),
            (128, 2),
            (16_383, 2),
            (16_384, 3),
            (2_097_151, 3),
            (2_097_152, 4),
            (268_435_455, 4),
            (268_435_456, 5),
            (i32::MAX, 5),
        ];

        for (val, len) in boundaries {
            let mut buf = BytesMut::new();
            write_varint(&mut buf, val);
            assert_eq!(buf.len(), len, "Wrong length for {}", val);
            // no superfluous continuation: last byte never zero unless the value is zero
            if val != 0 {
                assert_ne!(buf[buf.len() - 1], 0);
            }
        }
    }

    #[test]
    fn test_varint_canonical_encoding() {
        let mut buf = BytesMut::new();
        write_varint(&mut buf, 300);
        assert_eq!(&buf[..], &[0xAC, 0x02]);

        let mut buf = BytesMut::new();
        write_varint(&mut buf, -1);
        assert_eq!(&buf[..], &[0xFF, 0xFF, 0xFF, 0xFF, 0x0F]);
    }

    #[test]
    fn test_varint_too_long() {
        let mut data: &[u8] = &[0x80, 0x80, 0x80, 0x80, 0x80, 0x01];
        assert!(matches!(read_varint(&mut data), Err(BasaltError::FrameCorrupt(_))));
    }

    #[test]
    fn test_varint_truncated() {
        let mut data: &[u8] = &[0x80, 0x80];
        assert!(matches!(read_varint(&mut data), Err(BasaltError::FrameCorrupt(_))));
    }

    #[test]
    fn test_varlong_roundtrip() {
        for val in [0i64, 1, 300, i64::MAX, -1, i64::MIN] {
            let mut buf = BytesMut::new();
            write_varlong(&mut buf, val);
            assert!(buf.len() <= MAX_VARLONG_LEN);
            assert_eq!(read_varlong(&mut buf.freeze()).unwrap(), val);
        }
    }

    #[test]
    fn test_string_roundtrip() {
        let test_cases = vec!["", "Hello", "localhost", "Grüße, 世界", "🦀🦀"];

        for val in test_cases {
            let mut buf = BytesMut::new();
            write_string(&mut buf, val);
            let decoded = read_string(&mut buf.freeze(), MAX_STRING_LEN).unwrap();
            assert_eq!(val, decoded, "Failed for {}", val);
        }
    }

    #[test]
    fn test_string_over_limit() {
        let mut buf = BytesMut::new();
        write_string(&mut buf, "seventeen_chars__");
        assert!(read_string(&mut buf.freeze(), 16).is_err());
    }

    #[test]
    fn test_string_length_exceeds_buffer() {
        let mut buf = BytesMut::new();
        write_varint(&mut buf, 10);
        buf.put_slice(b"abc");
        assert!(matches!(
            read_string(&mut buf.freeze(), MAX_STRING_LEN),
            Err(BasaltError::FrameCorrupt(_))
        ));
    }

    #[test]
    fn test_invalid_bool() {
        let mut data: &[u8] = &[2];
        assert!(read_bool(&mut data).is_err());
    }

    #[test]
    fn test_position_roundtrip() {
        let pos = BlockPosition::new(-100, 64, 2000);
        let mut buf = BytesMut::new();
        write_position(&mut buf, pos);
        assert_eq!(buf.len(), 8);
        assert_eq!(read_position(&mut buf.freeze()).unwrap(), pos);
    }

    #[test]
    fn test_optional_chat() {
        let mut buf = BytesMut::new();
        write_optional_chat(&mut buf, None);
        assert_eq!(&buf[..], &[0]);

        let chat = ChatMessage::simple("hi");
        let mut buf = BytesMut::new();
        write_optional_chat(&mut buf, Some(&chat));
        let decoded = read_optional_chat(&mut buf.freeze()).unwrap();
        assert_eq!(decoded, Some(chat));
    }

    #[test]
    fn test_uuid_roundtrip() {
        let id = Uuid::from_u128(0x0123_4567_89ab_cdef_0123_4567_89ab_cdef);
        let mut buf = BytesMut::new();
        write_uuid(&mut buf, &id);
        assert_eq!(buf.len(), 16);
        assert_eq!(read_uuid(&mut buf.freeze()).unwrap(), id);
    }
}
