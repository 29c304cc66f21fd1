//! Handshaking state packets

use basalt_core::{BasaltError, ConnectionState, Result};
use bytes::{BufMut, Bytes, BytesMut};

use crate::codecs::*;
use crate::packet::{Direction, PacketDef};

/// Protocol version spoken by this server
pub const PROTOCOL_VERSION: i32 = 754;

/// Display name of [`PROTOCOL_VERSION`]
pub const VERSION_NAME: &str = "1.16.5";

/// Longest accepted server address in a handshake
pub const MAX_ADDRESS_LEN: usize = 255;

/// First packet of every connection
///
/// # Format
/// - VarInt: protocol version
/// - String(255): server address
/// - u16: server port
/// - VarInt: next state (1 = Status, 2 = Login)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    pub protocol_version: i32,
    pub server_address: String,
    pub server_port: u16,
    pub next_state: i32,
}

impl Handshake {
    /// The state the client asked for
    ///
    /// Anything other than Status or Login is a protocol violation.
    pub fn requested_state(&self) -> Result<ConnectionState> {
        ConnectionState::from_handshake(self.next_state).ok_or_else(|| {
            BasaltError::ProtocolViolation(format!("Invalid next state: {}", self.next_state))
        })
    }
}

impl PacketDef for Handshake {
    const ID: i32 = 0x00;
    const DIRECTION: Direction = Direction::Serverbound;
}

impl Encode for Handshake {
    fn encode(&self, buf: &mut BytesMut) {
        write_varint(buf, self.protocol_version);
        write_string(buf, &self.server_address);
        buf.put_u16(self.server_port);
        write_varint(buf, self.next_state);
    }
}

impl Decode for Handshake {
    fn decode(buf: &mut Bytes) -> Result<Self> {
        Ok(Self {
            protocol_version: read_varint(buf)?,
            server_address: read_string(buf, MAX_ADDRESS_LEN)?,
            server_port: read_u16(buf)?,
            next_state: read_varint(buf)?,
        })
    }
}
