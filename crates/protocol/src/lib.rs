//! # Basalt Protocol Library
//!
//! Wire protocol for Minecraft Java Edition 1.16.5 (protocol 754).
//!
//! ## Architecture
//!
//! The protocol is organized into several layers:
//!
//! ### 1. Codecs Layer ([`codecs`])
//! Binary encoding/decoding of primitive and composite values:
//! - VarInt / VarLong: 7 payload bits per byte, canonical encoding
//! - String: VarInt byte length + UTF-8, bounded by a character limit
//! - Fixed width integers and floats, big-endian
//! - Position: x/z/y packed into one `i64`
//! - Chat: JSON text components ([`chat`]), optionally presence-flagged
//! - Entity metadata records ([`metadata`])
//!
//! ### 2. Packet Model ([`packet`])
//! A raw [`Packet`] is an `(id, payload)` pair. Typed packets implement
//! [`PacketDef`] plus [`Encode`]/[`Decode`], so conversion is resolved at
//! compile time.
//!
//! ### 3. Framing ([`frame`], [`compression`])
//! Length-prefixed frames with optional zlib compression, read from any
//! `AsyncRead` and written to any `AsyncWrite`.
//!
//! ### 4. Encryption ([`cipher`], [`encryption`])
//! RSA key exchange during login and the AES/CFB-8 stream cipher that wraps
//! both directions afterwards.
//!
//! ### 5. Packets ([`handshake`], [`status`], [`login`], [`play`])
//! Concrete packet definitions per connection state.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use basalt_protocol::{Packet, Handshake};
//!
//! let handshake = Handshake {
//!     protocol_version: 754,
//!     server_address: "localhost".to_string(),
//!     server_port: 25565,
//!     next_state: 2,
//! };
//! let packet = Packet::from_def(&handshake);
//! let decoded: Handshake = packet.decode().unwrap();
//! assert_eq!(decoded, handshake);
//! ```

pub mod chat;
pub mod cipher;
pub mod codecs;
pub mod compression;
pub mod encryption;
pub mod frame;
pub mod handshake;
pub mod login;
pub mod metadata;
pub mod packet;
pub mod play;
pub mod status;

pub use chat::ChatMessage;
pub use cipher::{CipherDecryptor, CipherEncryptor, SharedSecret};
pub use codecs::{Decode, Encode};
pub use encryption::{session_hash, KeyExchange, ServerKeyPair};
pub use frame::{FrameReader, FrameWriter, MAX_FRAME_LEN};
pub use handshake::{Handshake, PROTOCOL_VERSION, VERSION_NAME};
pub use login::*;
pub use metadata::{EntityMetadata, MetadataValue};
pub use packet::{Direction, Packet, PacketDef};
pub use play::*;
pub use status::*;
