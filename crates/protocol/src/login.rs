//! Login state packets

use basalt_core::Result;
use bytes::{BufMut, Bytes, BytesMut};
use uuid::Uuid;

use crate::chat::ChatMessage;
use crate::codecs::*;
use crate::packet::{Direction, PacketDef};

/// Longest username a client may request
pub const MAX_USERNAME_LEN: usize = 16;

/// Upper bound for encrypted blobs in the encryption response
const MAX_ENCRYPTED_LEN: usize = 256;

/// Upper bound for the public key in the encryption request
const MAX_PUBLIC_KEY_LEN: usize = 4096;

/// Client asks to log in as `username`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginStart {
    pub username: String,
}

impl PacketDef for LoginStart {
    const ID: i32 = 0x00;
    const DIRECTION: Direction = Direction::Serverbound;
}

impl Encode for LoginStart {
    fn encode(&self, buf: &mut BytesMut) {
        write_string(buf, &self.username);
    }
}

impl Decode for LoginStart {
    fn decode(buf: &mut Bytes) -> Result<Self> {
        Ok(Self { username: read_string(buf, MAX_USERNAME_LEN)? })
    }
}

/// RSA-encrypted shared secret and verify token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionResponse {
    pub shared_secret: Bytes,
    pub verify_token: Bytes,
}

impl PacketDef for EncryptionResponse {
    const ID: i32 = 0x01;
    const DIRECTION: Direction = Direction::Serverbound;
}

impl Encode for EncryptionResponse {
    fn encode(&self, buf: &mut BytesMut) {
        write_byte_array(buf, &self.shared_secret);
        write_byte_array(buf, &self.verify_token);
    }
}

impl Decode for EncryptionResponse {
    fn decode(buf: &mut Bytes) -> Result<Self> {
        Ok(Self {
            shared_secret: read_byte_array(buf, MAX_ENCRYPTED_LEN)?,
            verify_token: read_byte_array(buf, MAX_ENCRYPTED_LEN)?,
        })
    }
}

/// Answer to a login plugin request
///
/// # Format
/// - VarInt: message id
/// - bool: understood
/// - remaining bytes: data (only when understood)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginPluginResponse {
    pub message_id: i32,
    pub successful: bool,
    pub data: Bytes,
}

impl PacketDef for LoginPluginResponse {
    const ID: i32 = 0x02;
    const DIRECTION: Direction = Direction::Serverbound;
}

impl Encode for LoginPluginResponse {
    fn encode(&self, buf: &mut BytesMut) {
        write_varint(buf, self.message_id);
        write_bool(buf, self.successful);
        buf.put_slice(&self.data);
    }
}

impl Decode for LoginPluginResponse {
    fn decode(buf: &mut Bytes) -> Result<Self> {
        Ok(Self {
            message_id: read_varint(buf)?,
            successful: read_bool(buf)?,
            data: read_remaining(buf),
        })
    }
}

/// Disconnect during login
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginDisconnect {
    pub reason: ChatMessage,
}

impl PacketDef for LoginDisconnect {
    const ID: i32 = 0x00;
    const DIRECTION: Direction = Direction::Clientbound;
}

impl Encode for LoginDisconnect {
    fn encode(&self, buf: &mut BytesMut) {
        write_chat(buf, &self.reason);
    }
}

impl Decode for LoginDisconnect {
    fn decode(buf: &mut Bytes) -> Result<Self> {
        Ok(Self { reason: read_chat(buf)? })
    }
}

/// Server public key and verify token
///
/// # Format
/// - String(20): server id (empty for vanilla)
/// - VarInt + bytes: public key (SubjectPublicKeyInfo DER)
/// - VarInt + bytes: verify token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionRequest {
    pub server_id: String,
    pub public_key: Bytes,
    pub verify_token: Bytes,
}

impl PacketDef for EncryptionRequest {
    const ID: i32 = 0x01;
    const DIRECTION: Direction = Direction::Clientbound;
}

impl Encode for EncryptionRequest {
    fn encode(&self, buf: &mut BytesMut) {
        write_string(buf, &self.server_id);
        write_byte_array(buf, &self.public_key);
        write_byte_array(buf, &self.verify_token);
    }
}

impl Decode for EncryptionRequest {
    fn decode(buf: &mut Bytes) -> Result<Self> {
        Ok(Self {
            server_id: read_string(buf, 20)?,
            public_key: read_byte_array(buf, MAX_PUBLIC_KEY_LEN)?,
            verify_token: read_byte_array(buf, MAX_ENCRYPTED_LEN)?,
        })
    }
}

/// Login accepted; the connection moves to Play
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginSuccess {
    pub uuid: Uuid,
    pub username: String,
}

impl PacketDef for LoginSuccess {
    const ID: i32 = 0x02;
    const DIRECTION: Direction = Direction::Clientbound;
}

impl Encode for LoginSuccess {
    fn encode(&self, buf: &mut BytesMut) {
        write_uuid(buf, &self.uuid);
        write_string(buf, &self.username);
    }
}

impl Decode for LoginSuccess {
    fn decode(buf: &mut Bytes) -> Result<Self> {
        Ok(Self {
            uuid: read_uuid(buf)?,
            username: read_string(buf, MAX_USERNAME_LEN)?,
        })
    }
}

/// Enables compression for every following frame in both directions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetCompression {
    pub threshold: i32,
}

impl PacketDef for SetCompression {
    const ID: i32 = 0x03;
    const DIRECTION: Direction = Direction::Clientbound;
}

impl Encode for SetCompression {
    fn encode(&self, buf: &mut BytesMut) {
        write_varint(buf, self.threshold);
    }
}

impl Decode for SetCompression {
    fn decode(buf: &mut Bytes) -> Result<Self> {
        Ok(Self { threshold: read_varint(buf)? })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::Packet;

    #[test]
    fn test_login_start_name_limit() {
        let ok = Packet::from_def(&LoginStart { username: "Notch".into() });
        assert_eq!(ok.decode::<LoginStart>().unwrap().username, "Notch");

        let too_long = Packet::from_def(&LoginStart { username: "a".repeat(17) });
        assert!(too_long.decode::<LoginStart>().is_err());
    }

    #[test]
    fn test_login_success_layout() {
        let uuid = Uuid::from_u128(1);
        let packet = Packet::from_def(&LoginSuccess { uuid, username: "Alex".into() });
        assert_eq!(packet.id, 0x02);
        assert_eq!(packet.payload.len(), 16 + 1 + 4);
        assert_eq!(packet.payload[15], 1);
    }

    #[test]
    fn test_plugin_response_rest() {
        let response = LoginPluginResponse {
            message_id: 7,
            successful: true,
            data: Bytes::from_static(b"velocity"),
        };
        let packet = Packet::from_def(&response);
        assert_eq!(packet.decode::<LoginPluginResponse>().unwrap(), response);
    }

    #[test]
    fn test_disconnect_reason_json() {
        let packet = Packet::from_def(&LoginDisconnect { reason: ChatMessage::simple("Bye") });
        let mut payload = packet.payload.clone();
        assert_eq!(read_string(&mut payload, MAX_STRING_LEN).unwrap(), r#"{"text":"Bye"}"#);
    }
}
