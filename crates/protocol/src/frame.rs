//! Frame reader and writer
//!
//! # Format
//! Uncompressed:
//! - VarInt: frame length
//! - VarInt: packet id
//! - payload
//!
//! Compressed (after Set Compression):
//! - VarInt: frame length
//! - VarInt: uncompressed data length (0 when sent raw)
//! - zlib(`[packet id][payload]`), or the raw bytes when the length is 0
//!
//! Once enabled, encryption covers every byte of every following frame,
//! length prefix included.

use basalt_core::{BasaltError, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::cipher::{CipherDecryptor, CipherEncryptor, SharedSecret};
use crate::codecs::{read_varint, varint_len, write_varint, MAX_VARINT_LEN};
use crate::compression::{compress, decompress};
use crate::packet::{Direction, Packet};

/// Largest frame length a 3-byte VarInt can declare
pub const MAX_FRAME_LEN: usize = 2_097_151;

/// Append one complete frame for `packet` to `out`
///
/// With a threshold set, bodies of at least `threshold` bytes are compressed.
pub fn encode_frame(packet: &Packet, threshold: Option<usize>, out: &mut BytesMut) -> Result<()> {
    let mut body = BytesMut::with_capacity(varint_len(packet.id) + packet.payload.len());
    write_varint(&mut body, packet.id);
    body.put_slice(&packet.payload);

    let inner = match threshold {
        None => body,
        Some(threshold) if body.len() < threshold => {
            let mut inner = BytesMut::with_capacity(1 + body.len());
            write_varint(&mut inner, 0);
            inner.put_slice(&body);
            inner
        }
        Some(_) => {
            let compressed = compress(&body)?;
            let mut inner = BytesMut::with_capacity(MAX_VARINT_LEN + compressed.len());
            write_varint(&mut inner, body.len() as i32);
            inner.put_slice(&compressed);
            inner
        }
    };

    if inner.len() > MAX_FRAME_LEN {
        return Err(BasaltError::InvalidData(format!(
            "Packet 0x{:02X} too large for one frame: {} bytes",
            packet.id,
            inner.len()
        )));
    }

    write_varint(out, inner.len() as i32);
    out.put_slice(&inner);
    Ok(())
}

/// Decode the bytes following a frame's length prefix
pub fn decode_frame_body(
    mut frame: Bytes,
    threshold: Option<usize>,
    direction: Direction,
) -> Result<Packet> {
    let mut body = match threshold {
        None => frame,
        Some(threshold) => {
            let data_len = read_varint(&mut frame)?;
            if data_len == 0 {
                frame
            } else if data_len < 0 || (data_len as usize) < threshold {
                return Err(BasaltError::FrameCorrupt(format!(
                    "Compressed length {} below threshold {}",
                    data_len, threshold
                )));
            } else if data_len as usize > MAX_FRAME_LEN {
                return Err(BasaltError::FrameCorrupt(format!(
                    "Compressed length {} exceeds maximum",
                    data_len
                )));
            } else {
                Bytes::from(decompress(&frame, data_len as usize)?)
            }
        }
    };

    let id = read_varint(&mut body)?;
    let payload = body.copy_to_bytes(body.remaining());
    Ok(Packet::new(id, payload, direction))
}

fn eof_as_corrupt(e: std::io::Error) -> BasaltError {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        BasaltError::FrameCorrupt("Truncated frame".into())
    } else {
        BasaltError::Io(e)
    }
}

/// Reads frames from the inbound half of a connection
///
/// The length prefix is read byte by byte so nothing past the current frame
/// is consumed; wrap the stream in a `BufReader` for throughput.
pub struct FrameReader<R> {
    reader: R,
    direction: Direction,
    threshold: Option<usize>,
    cipher: Option<CipherDecryptor>,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// A reader for frames sent by `direction`'s peer
    pub fn new(reader: R, direction: Direction) -> Self {
        Self { reader, direction, threshold: None, cipher: None }
    }

    pub fn enable_compression(&mut self, threshold: usize) -> Result<()> {
        if self.threshold.is_some() {
            return Err(BasaltError::ProtocolViolation("Compression already enabled".into()));
        }
        self.threshold = Some(threshold);
        Ok(())
    }

    pub fn enable_encryption(&mut self, secret: &SharedSecret) -> Result<()> {
        if self.cipher.is_some() {
            return Err(BasaltError::ProtocolViolation("Encryption already enabled".into()));
        }
        self.cipher = Some(CipherDecryptor::new(secret)?);
        Ok(())
    }

    pub fn is_encrypted(&self) -> bool {
        self.cipher.is_some()
    }

    pub fn compression_threshold(&self) -> Option<usize> {
        self.threshold
    }

    async fn read_byte(&mut self) -> Result<Option<u8>> {
        let mut byte = [0u8; 1];
        if self.reader.read(&mut byte).await? == 0 {
            return Ok(None);
        }
        if let Some(cipher) = self.cipher.as_mut() {
            cipher.decrypt(&mut byte);
        }
        Ok(Some(byte[0]))
    }

    async fn read_length(&mut self) -> Result<Option<usize>> {
        let mut value: u32 = 0;
        for i in 0..MAX_VARINT_LEN {
            let byte = match self.read_byte().await? {
                Some(byte) => byte,
                None if i == 0 => return Ok(None),
                None => return Err(BasaltError::FrameCorrupt("Truncated frame length".into())),
            };
            value |= ((byte & 0x7F) as u32) << (7 * i);
            if byte & 0x80 == 0 {
                let len = value as i32;
                if len <= 0 || len as usize > MAX_FRAME_LEN {
                    return Err(BasaltError::FrameCorrupt(format!("Invalid frame length: {}", len)));
                }
                return Ok(Some(len as usize));
            }
        }
        Err(BasaltError::FrameCorrupt("Frame length VarInt is longer than 5 bytes".into()))
    }

    /// Read the next packet
    ///
    /// Returns `Ok(None)` when the peer closed cleanly between frames.
    pub async fn read_frame(&mut self) -> Result<Option<Packet>> {
        let len = match self.read_length().await? {
            Some(len) => len,
            None => return Ok(None),
        };

        let mut frame = vec![0u8; len];
        self.reader.read_exact(&mut frame).await.map_err(eof_as_corrupt)?;
        if let Some(cipher) = self.cipher.as_mut() {
            cipher.decrypt(&mut frame);
        }

        decode_frame_body(Bytes::from(frame), self.threshold, self.direction).map(Some)
    }
}

/// Writes frames to the outbound half of a connection
pub struct FrameWriter<W> {
    writer: W,
    threshold: Option<usize>,
    cipher: Option<CipherEncryptor>,
    buf: BytesMut,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, threshold: None, cipher: None, buf: BytesMut::with_capacity(1024) }
    }

    pub fn enable_compression(&mut self, threshold: usize) -> Result<()> {
        if self.threshold.is_some() {
            return Err(BasaltError::ProtocolViolation("Compression already enabled".into()));
        }
        self.threshold = Some(threshold);
        Ok(())
    }

    pub fn enable_encryption(&mut self, secret: &SharedSecret) -> Result<()> {
        if self.cipher.is_some() {
            return Err(BasaltError::ProtocolViolation("Encryption already enabled".into()));
        }
        self.cipher = Some(CipherEncryptor::new(secret)?);
        Ok(())
    }

    pub fn is_encrypted(&self) -> bool {
        self.cipher.is_some()
    }

    /// Frame, compress and encrypt `packet`, then write it with one `write_all`
    pub async fn write_packet(&mut self, packet: &Packet) -> Result<()> {
        self.buf.clear();
        encode_frame(packet, self.threshold, &mut self.buf)?;
        if let Some(cipher) = self.cipher.as_mut() {
            cipher.encrypt(&mut self.buf);
        }
        self.writer.write_all(&self.buf).await?;
        self.writer.flush().await?;
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        self.writer.shutdown().await?;
        Ok(())
    }
}
