//! Symmetric stream cipher for authenticated sessions
//!
//! AES-128 in CFB-8 mode. The shared secret is both key and IV, and each
//! direction keeps its own running cipher state.

use aes::cipher::{inout::InOutBuf, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use basalt_core::{BasaltError, Result};
use zeroize::{Zeroize, ZeroizeOnDrop};

pub type Aes128Cfb8Enc = cfb8::Encryptor<aes::Aes128>;
pub type Aes128Cfb8Dec = cfb8::Decryptor<aes::Aes128>;

/// Length of the negotiated secret in bytes
pub const SHARED_SECRET_LEN: usize = 16;

/// The negotiated 16-byte secret
///
/// Zeroed when dropped. The direction ciphers built from it wipe their own
/// key schedules on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct SharedSecret([u8; SHARED_SECRET_LEN]);

impl SharedSecret {
    pub fn new(bytes: [u8; SHARED_SECRET_LEN]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; SHARED_SECRET_LEN] = bytes.try_into().map_err(|_| {
            BasaltError::AuthenticationFailure(format!(
                "Shared secret must be {} bytes, got {}",
                SHARED_SECRET_LEN,
                bytes.len()
            ))
        })?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Build the two direction ciphers for this secret
    pub fn ciphers(&self) -> Result<(CipherEncryptor, CipherDecryptor)> {
        Ok((CipherEncryptor::new(self)?, CipherDecryptor::new(self)?))
    }
}

impl std::fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SharedSecret(..)")
    }
}

impl Zeroize for SharedSecret {
    fn zeroize(&mut self) {
        self.0.zeroize();
    }
}

impl Drop for SharedSecret {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl ZeroizeOnDrop for SharedSecret {}

/// Outbound half of the stream cipher
pub struct CipherEncryptor {
    inner: Aes128Cfb8Enc,
}

impl CipherEncryptor {
    pub fn new(secret: &SharedSecret) -> Result<Self> {
        let inner = Aes128Cfb8Enc::new_from_slices(secret.as_bytes(), secret.as_bytes())
            .map_err(|e| BasaltError::Encryption(e.to_string()))?;
        Ok(Self { inner })
    }

    /// Encrypt in place, advancing the stream state
    pub fn encrypt(&mut self, data: &mut [u8]) {
        let (chunks, _rest) = InOutBuf::from(data).into_chunks();
        self.inner.encrypt_blocks_inout_mut(chunks);
    }
}

/// Inbound half of the stream cipher
pub struct CipherDecryptor {
    inner: Aes128Cfb8Dec,
}

impl CipherDecryptor {
    pub fn new(secret: &SharedSecret) -> Result<Self> {
        let inner = Aes128Cfb8Dec::new_from_slices(secret.as_bytes(), secret.as_bytes())
            .map_err(|e| BasaltError::Encryption(e.to_string()))?;
        Ok(Self { inner })
    }

    /// Decrypt in place, advancing the stream state
    pub fn decrypt(&mut self, data: &mut [u8]) {
        let (chunks, _rest) = InOutBuf::from(data).into_chunks();
        self.inner.decrypt_blocks_inout_mut(chunks);
    }
}

impl std::fmt::Debug for CipherEncryptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CipherEncryptor")
    }
}

impl std::fmt::Debug for CipherDecryptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CipherDecryptor")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret() -> SharedSecret {
        SharedSecret::new(*b"0123456789abcdef")
    }

    #[test]
    fn test_stream_roundtrip_across_calls() {
        let (mut enc, mut dec) = secret().ciphers().unwrap();

        let mut first = b"hello".to_vec();
        let mut second = b", world".to_vec();
        enc.encrypt(&mut first);
        enc.encrypt(&mut second);
        assert_ne!(&first[..], b"hello");

        // decrypt with different chunking; CFB-8 is byte-granular
        let mut joined = [first, second].concat();
        let (head, tail) = joined.split_at_mut(3);
        dec.decrypt(head);
        dec.decrypt(tail);
        assert_eq!(&joined[..], b"hello, world");
    }

    #[test]
    fn test_state_carries_over() {
        let (mut enc, _) = secret().ciphers().unwrap();
        let mut a = b"same".to_vec();
        let mut b = b"same".to_vec();
        enc.encrypt(&mut a);
        enc.encrypt(&mut b);
        assert_ne!(a, b);
    }

    #[test]
    fn test_secret_length() {
        assert!(SharedSecret::from_slice(&[0u8; 15]).is_err());
        assert!(SharedSecret::from_slice(&[0u8; 16]).is_ok());
    }

    #[test]
    fn test_secret_zeroize() {
        let mut secret = secret();
        secret.zeroize();
        assert_eq!(secret.as_bytes(), &[0u8; SHARED_SECRET_LEN]);
    }

    #[test]
    fn test_key_material_wiped_on_drop() {
        fn wiped_on_drop<T: ZeroizeOnDrop>() {}
        wiped_on_drop::<SharedSecret>();
        wiped_on_drop::<Aes128Cfb8Enc>();
        wiped_on_drop::<Aes128Cfb8Dec>();
    }

    #[test]
    fn test_debug_hides_key() {
        assert_eq!(format!("{:?}", secret()), "SharedSecret(..)");
    }
}
