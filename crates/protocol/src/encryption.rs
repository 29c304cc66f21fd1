//! Login key exchange
//!
//! The server owns one RSA key pair for its lifetime. Each authenticating
//! connection gets a fresh [`KeyExchange`] with its own verify token.

use basalt_core::{BasaltError, Result};
use rsa::pkcs8::EncodePublicKey;
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};
use sha1::{Digest, Sha1};
use zeroize::Zeroizing;

use crate::cipher::SharedSecret;

/// RSA modulus size used by vanilla clients
pub const RSA_KEY_BITS: usize = 1024;

/// Length of the per-connection verify token
pub const VERIFY_TOKEN_LEN: usize = 4;

/// Server RSA key pair plus its SubjectPublicKeyInfo DER encoding
pub struct ServerKeyPair {
    private: RsaPrivateKey,
    public: RsaPublicKey,
    public_der: Vec<u8>,
}

impl ServerKeyPair {
    pub fn generate() -> Result<Self> {
        let mut rng = rand::thread_rng();
        let private = RsaPrivateKey::new(&mut rng, RSA_KEY_BITS)
            .map_err(|e| BasaltError::Encryption(format!("RSA key generation failed: {}", e)))?;
        let public = RsaPublicKey::from(&private);
        let public_der = public
            .to_public_key_der()
            .map_err(|e| BasaltError::Encryption(format!("Public key encoding failed: {}", e)))?
            .as_bytes()
            .to_vec();

        tracing::debug!("Generated {}-bit server key pair", RSA_KEY_BITS);
        Ok(Self { private, public, public_der })
    }

    pub fn public_der(&self) -> &[u8] {
        &self.public_der
    }

    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public
    }

    /// PKCS#1 v1.5 decrypt; any failure is an authentication failure
    pub fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        self.private
            .decrypt(Pkcs1v15Encrypt, data)
            .map_err(|_| BasaltError::AuthenticationFailure("Failed to decrypt login data".into()))
    }
}

impl std::fmt::Debug for ServerKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerKeyPair").field("public_der_len", &self.public_der.len()).finish()
    }
}

/// One connection's pending key exchange
#[derive(Debug)]
pub struct KeyExchange {
    verify_token: [u8; VERIFY_TOKEN_LEN],
}

impl KeyExchange {
    pub fn new() -> Self {
        Self { verify_token: rand::random() }
    }

    pub fn verify_token(&self) -> &[u8] {
        &self.verify_token
    }

    /// Check the client's encryption response and recover the shared secret
    ///
    /// The token is checked first; a mismatch in any byte fails.
    pub fn complete(
        &self,
        keys: &ServerKeyPair,
        encrypted_secret: &[u8],
        encrypted_token: &[u8],
    ) -> Result<SharedSecret> {
        let token = keys.decrypt(encrypted_token)?;
        if token.len() != self.verify_token.len()
            || token.iter().zip(self.verify_token.iter()).fold(0u8, |acc, (a, b)| acc | (a ^ b)) != 0
        {
            return Err(BasaltError::AuthenticationFailure("Verify token mismatch".into()));
        }

        let secret = Zeroizing::new(keys.decrypt(encrypted_secret)?);
        SharedSecret::from_slice(&secret)
    }
}

impl Default for KeyExchange {
    fn default() -> Self {
        Self::new()
    }
}

/// Session hash sent to the identity collaborator
///
/// SHA-1 over server id, shared secret and public key DER, rendered as
/// [`minecraft_digest`].
pub fn session_hash(server_id: &str, secret: &SharedSecret, public_der: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(server_id.as_bytes());
    hasher.update(secret.as_bytes());
    hasher.update(public_der);
    minecraft_digest(&hasher.finalize())
}

/// Render a digest as a signed big-endian integer in lowercase hex
///
/// Negative values get a leading `-`; leading zeros are stripped.
pub fn minecraft_digest(digest: &[u8]) -> String {
    let negative = digest.first().map_or(false, |b| b & 0x80 != 0);
    let mut bytes = digest.to_vec();
    if negative {
        // two's complement
        let mut carry = true;
        for byte in bytes.iter_mut().rev() {
            *byte = !*byte;
            if carry {
                let (value, overflow) = byte.overflowing_add(1);
                *byte = value;
                carry = overflow;
            }
        }
    }

    let hex: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
    let trimmed = hex.trim_start_matches('0');
    let trimmed = if trimmed.is_empty() { "0" } else { trimmed };
    if negative {
        format!("-{}", trimmed)
    } else {
        trimmed.to_string()
    }
}
