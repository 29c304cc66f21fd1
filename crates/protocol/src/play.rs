//! Play state packets handled by the connection engine
//!
//! Everything else in Play belongs to gameplay handlers.

use basalt_core::Result;
use bytes::{BufMut, Bytes, BytesMut};

use crate::chat::ChatMessage;
use crate::codecs::*;
use crate::packet::{Direction, PacketDef};

/// Channel the server brand is announced on
pub const BRAND_CHANNEL: &str = "minecraft:brand";

/// Serverbound Keep Alive id
pub const SERVERBOUND_KEEP_ALIVE: i32 = 0x10;

/// Client's answer to a liveness challenge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepAliveResponse {
    pub id: i64,
}

impl PacketDef for KeepAliveResponse {
    const ID: i32 = SERVERBOUND_KEEP_ALIVE;
    const DIRECTION: Direction = Direction::Serverbound;
}

impl Encode for KeepAliveResponse {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_i64(self.id);
    }
}

impl Decode for KeepAliveResponse {
    fn decode(buf: &mut Bytes) -> Result<Self> {
        Ok(Self { id: read_i64(buf)? })
    }
}

/// Liveness challenge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepAliveChallenge {
    pub id: i64,
}

impl PacketDef for KeepAliveChallenge {
    const ID: i32 = 0x1F;
    const DIRECTION: Direction = Direction::Clientbound;
}

impl Encode for KeepAliveChallenge {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_i64(self.id);
    }
}

impl Decode for KeepAliveChallenge {
    fn decode(buf: &mut Bytes) -> Result<Self> {
        Ok(Self { id: read_i64(buf)? })
    }
}

/// Disconnect during play
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayDisconnect {
    pub reason: ChatMessage,
}

impl PacketDef for PlayDisconnect {
    const ID: i32 = 0x19;
    const DIRECTION: Direction = Direction::Clientbound;
}

impl Encode for PlayDisconnect {
    fn encode(&self, buf: &mut BytesMut) {
        write_chat(buf, &self.reason);
    }
}

impl Decode for PlayDisconnect {
    fn decode(buf: &mut Bytes) -> Result<Self> {
        Ok(Self { reason: read_chat(buf)? })
    }
}

/// Custom payload on a named channel
///
/// # Format
/// - String: channel identifier
/// - remaining bytes: channel data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginMessage {
    pub channel: String,
    pub data: Bytes,
}

impl PluginMessage {
    /// The `minecraft:brand` message; data is a length-prefixed string
    pub fn brand(brand: &str) -> Self {
        let mut data = BytesMut::new();
        write_string(&mut data, brand);
        Self { channel: BRAND_CHANNEL.to_string(), data: data.freeze() }
    }
}

impl PacketDef for PluginMessage {
    const ID: i32 = 0x17;
    const DIRECTION: Direction = Direction::Clientbound;
}

impl Encode for PluginMessage {
    fn encode(&self, buf: &mut BytesMut) {
        write_string(buf, &self.channel);
        buf.put_slice(&self.data);
    }
}

impl Decode for PluginMessage {
    fn decode(buf: &mut Bytes) -> Result<Self> {
        Ok(Self {
            channel: read_string(buf, MAX_STRING_LEN)?,
            data: read_remaining(buf),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::Packet;

    #[test]
    fn test_keep_alive_ids() {
        let challenge = Packet::from_def(&KeepAliveChallenge { id: 42 });
        assert_eq!(challenge.id, 0x1F);
        assert_eq!(&challenge.payload[..], &42i64.to_be_bytes());

        let response = Packet::serverbound(0x10, 42i64.to_be_bytes().to_vec());
        assert_eq!(response.decode::<KeepAliveResponse>().unwrap().id, 42);
    }

    #[test]
    fn test_brand_message() {
        let packet = Packet::from_def(&PluginMessage::brand("basalt"));
        let decoded = packet.decode::<PluginMessage>().unwrap();
        assert_eq!(decoded.channel, BRAND_CHANNEL);

        let mut data = decoded.data;
        assert_eq!(read_string(&mut data, MAX_STRING_LEN).unwrap(), "basalt");
    }
}
