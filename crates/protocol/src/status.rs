//! Status state packets and the server-list payload

use basalt_core::Result;
use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::chat::ChatMessage;
use crate::codecs::*;
use crate::handshake::{PROTOCOL_VERSION, VERSION_NAME};
use crate::packet::{Direction, PacketDef};

/// Status request (no fields)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusRequest;

impl PacketDef for StatusRequest {
    const ID: i32 = 0x00;
    const DIRECTION: Direction = Direction::Serverbound;
}

impl Encode for StatusRequest {
    fn encode(&self, _buf: &mut BytesMut) {}
}

impl Decode for StatusRequest {
    fn decode(_buf: &mut Bytes) -> Result<Self> {
        Ok(Self)
    }
}

/// Latency probe carrying a client nonce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ping {
    pub payload: i64,
}

impl PacketDef for Ping {
    const ID: i32 = 0x01;
    const DIRECTION: Direction = Direction::Serverbound;
}

impl Encode for Ping {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_i64(self.payload);
    }
}

impl Decode for Ping {
    fn decode(buf: &mut Bytes) -> Result<Self> {
        Ok(Self { payload: read_i64(buf)? })
    }
}

/// Server-list JSON
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusResponse {
    pub json: String,
}

impl PacketDef for StatusResponse {
    const ID: i32 = 0x00;
    const DIRECTION: Direction = Direction::Clientbound;
}

impl Encode for StatusResponse {
    fn encode(&self, buf: &mut BytesMut) {
        write_string(buf, &self.json);
    }
}

impl Decode for StatusResponse {
    fn decode(buf: &mut Bytes) -> Result<Self> {
        Ok(Self { json: read_string(buf, MAX_STRING_LEN)? })
    }
}

/// Echo of [`Ping`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pong {
    pub payload: i64,
}

impl PacketDef for Pong {
    const ID: i32 = 0x01;
    const DIRECTION: Direction = Direction::Clientbound;
}

impl Encode for Pong {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_i64(self.payload);
    }
}

impl Decode for Pong {
    fn decode(buf: &mut Bytes) -> Result<Self> {
        Ok(Self { payload: read_i64(buf)? })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusVersion {
    pub name: String,
    pub protocol: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSample {
    pub name: String,
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusPlayers {
    pub max: u32,
    pub online: u32,
    #[serde(default)]
    pub sample: Vec<PlayerSample>,
}

/// Body of [`StatusResponse`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerStatus {
    pub version: StatusVersion,
    pub players: StatusPlayers,
    pub description: ChatMessage,
}

impl ServerStatus {
    pub fn new(motd: &str, online: u32, max: u32, sample: Vec<PlayerSample>) -> Self {
        Self {
            version: StatusVersion { name: VERSION_NAME.to_string(), protocol: PROTOCOL_VERSION },
            players: StatusPlayers { max, online, sample },
            description: ChatMessage::simple(motd),
        }
    }

    pub fn to_response(&self) -> StatusResponse {
        // plain data, serialization cannot fail
        let json = serde_json::to_string(self).unwrap_or_default();
        StatusResponse { json }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::Packet;

    #[test]
    fn test_status_json_shape() {
        let status = ServerStatus::new(
            "A Basalt server",
            1,
            20,
            vec![PlayerSample { name: "Steve".into(), id: "8667ba71-b85a-4004-af54-457a9734eed7".into() }],
        );
        let response = status.to_response();
        let value: serde_json::Value = serde_json::from_str(&response.json).unwrap();

        assert_eq!(value["version"]["protocol"], PROTOCOL_VERSION);
        assert_eq!(value["version"]["name"], VERSION_NAME);
        assert_eq!(value["players"]["max"], 20);
        assert_eq!(value["players"]["online"], 1);
        assert_eq!(value["players"]["sample"][0]["name"], "Steve");
        assert_eq!(value["description"]["text"], "A Basalt server");
    }

    #[test]
    fn test_ping_pong_payload() {
        let ping = Packet::serverbound(0x01, 1234567890i64.to_be_bytes().to_vec());
        let decoded = ping.decode::<Ping>().unwrap();
        let pong = Packet::from_def(&Pong { payload: decoded.payload });
        assert_eq!(pong.id, 0x01);
        assert_eq!(pong.payload, ping.payload);
    }

    #[test]
    fn test_request_rejects_payload() {
        let packet = Packet::serverbound(0x00, vec![1]);
        assert!(packet.decode::<StatusRequest>().is_err());
    }
}
