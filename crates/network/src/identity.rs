//! Player identity
//!
//! The connection engine asks an [`IdentityProvider`] who a player is. The
//! provider is a collaborator: this crate only ships the offline one.

use async_trait::async_trait;
use basalt_core::Result;
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Signed profile property such as `textures`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileProperty {
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

/// Who a session belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameProfile {
    #[serde(rename = "id")]
    pub uuid: Uuid,
    #[serde(rename = "name")]
    pub username: String,
    #[serde(default)]
    pub properties: Vec<ProfileProperty>,
}

impl GameProfile {
    pub fn new(uuid: Uuid, username: impl Into<String>) -> Self {
        Self { uuid, username: username.into(), properties: Vec::new() }
    }

    /// Profile for an unauthenticated player
    pub fn offline(username: &str) -> Self {
        Self::new(offline_uuid(username), username)
    }
}

/// Name-based (v3) UUID of `OfflinePlayer:<name>`
pub fn offline_uuid(username: &str) -> Uuid {
    let digest = Md5::digest(format!("OfflinePlayer:{}", username).as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest);
    uuid::Builder::from_md5_bytes(bytes).into_uuid()
}

/// Resolves usernames to profiles
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Verify that `username` joined with `session_hash`
    ///
    /// `Ok(None)` means the player is not recognised.
    async fn lookup(&self, username: &str, session_hash: &str) -> Result<Option<GameProfile>>;

    /// Profile used when authentication is disabled
    async fn lookup_offline(&self, username: &str) -> Result<GameProfile> {
        Ok(GameProfile::offline(username))
    }
}

/// Identity provider that never contacts a session service
///
/// `lookup` trusts the client and hands out the offline profile, so pairing
/// it with online mode gives encryption without verified identities.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineIdentity;

#[async_trait]
impl IdentityProvider for OfflineIdentity {
    async fn lookup(&self, username: &str, _session_hash: &str) -> Result<Option<GameProfile>> {
        Ok(Some(GameProfile::offline(username)))
    }
}
