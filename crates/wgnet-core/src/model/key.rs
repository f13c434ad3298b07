// ── Tunnel peer keys ──
//
// Curve25519 public keys are the only key material the store keeps.
// Private keys are generated on request, handed back once, and dropped.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rand::RngCore;
use rand::rngs::OsRng;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use x25519_dalek::{PublicKey, StaticSecret};

use crate::error::CoreError;

pub const KEY_LEN: usize = 32;

/// A tunnel peer's public key, base64 on the wire.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PeerKey([u8; KEY_LEN]);

impl PeerKey {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// Decodes a key stored as raw bytes.
    pub(crate) fn from_slice(bytes: &[u8]) -> Option<Self> {
        <[u8; KEY_LEN]>::try_from(bytes).ok().map(Self)
    }
}

impl fmt::Display for PeerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&STANDARD.encode(self.0))
    }
}

impl fmt::Debug for PeerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerKey({self})")
    }
}

impl FromStr for PeerKey {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = STANDARD
            .decode(s.trim())
            .map_err(|_| CoreError::validation("public_key", "must be base64"))?;
        Self::from_slice(&bytes)
            .ok_or_else(|| CoreError::validation("public_key", "must decode to 32 bytes"))
    }
}

impl TryFrom<String> for PeerKey {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PeerKey> for String {
    fn from(key: PeerKey) -> Self {
        key.to_string()
    }
}

/// Freshly generated keypair. The private half is only ever returned to
/// the caller who asked for it.
pub struct GeneratedKey {
    pub public: PeerKey,
    pub private: SecretString,
}

impl GeneratedKey {
    pub fn generate() -> Self {
        let mut seed = [0_u8; KEY_LEN];
        OsRng.fill_bytes(&mut seed);

        let secret = StaticSecret::from(seed);
        let public = PublicKey::from(&secret);

        Self {
            public: PeerKey(public.to_bytes()),
            private: SecretString::from(STANDARD.encode(secret.to_bytes())),
        }
    }

    pub fn private_base64(&self) -> &str {
        self.private.expose_secret()
    }
}

impl fmt::Debug for GeneratedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratedKey")
            .field("public", &self.public)
            .field("private", &"[redacted]")
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn generated_public_key_matches_private_half() {
        let pair = GeneratedKey::generate();
        let private: [u8; KEY_LEN] = STANDARD
            .decode(pair.private_base64())
            .unwrap()
            .try_into()
            .unwrap();
        let derived = PublicKey::from(&StaticSecret::from(private));
        assert_eq!(pair.public.as_bytes(), derived.as_bytes());
    }

    #[test]
    fn debug_redacts_private_key() {
        let pair = GeneratedKey::generate();
        let rendered = format!("{pair:?}");
        assert!(rendered.contains("[redacted]"));
        assert!(!rendered.contains(pair.private_base64()));
    }

    #[test]
    fn rejects_wrong_length() {
        let short = STANDARD.encode([7_u8; 16]);
        let err = short.parse::<PeerKey>().unwrap_err();
        assert!(err.to_string().contains("32 bytes"));
    }

    #[test]
    fn serde_uses_base64_text() {
        let key = PeerKey::from_bytes([1; KEY_LEN]);
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, format!("\"{key}\""));
        let back: PeerKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
        assert!(serde_json::from_str::<PeerKey>("\"!!\"").is_err());
    }
}
