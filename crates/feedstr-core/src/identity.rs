//! Per-feed signing identities.
//!
//! Every registered feed gets exactly one keypair, generated at registration
//! time and never rotated. The secret key authors all messages republished
//! from that feed; the public key is the feed's stable identity on the
//! network.

use nostr::{Keys, PublicKey, ToBech32};

use crate::error::{Error, Result};

/// A feed's signing identity.
///
/// Wraps a nostr keypair. Constructed either fresh (new feed) or from the
/// hex-encoded secret key persisted in the record store.
#[derive(Debug, Clone)]
pub struct FeedIdentity {
    keys: Keys,
}

impl FeedIdentity {
    /// Generate a fresh identity for a newly registered feed.
    pub fn generate() -> Self {
        Self {
            keys: Keys::generate(),
        }
    }

    /// Restore an identity from the persisted hex secret key.
    pub fn from_secret_hex(secret_hex: &str) -> Result<Self> {
        let keys = Keys::parse(secret_hex)?;
        Ok(Self { keys })
    }

    /// The underlying keypair, for signing.
    pub fn keys(&self) -> &Keys {
        &self.keys
    }

    /// Hex-encoded public key, as persisted in the record store.
    pub fn public_key_hex(&self) -> String {
        self.keys.public_key().to_hex()
    }

    /// Hex-encoded secret key, as persisted in the record store.
    pub fn secret_key_hex(&self) -> String {
        self.keys.secret_key().to_secret_hex()
    }

    /// Bech32 (npub) encoding of the public key, for display and API results.
    pub fn npub(&self) -> Result<String> {
        self.keys
            .public_key()
            .to_bech32()
            .map_err(|e| Error::Bech32(e.to_string()))
    }
}

/// Encode a stored hex public key as npub without loading the secret key.
pub fn npub_from_hex(public_hex: &str) -> Result<String> {
    let pk = PublicKey::parse(public_hex)?;
    pk.to_bech32().map_err(|e| Error::Bech32(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_roundtrip() {
        let identity = FeedIdentity::generate();
        let restored = FeedIdentity::from_secret_hex(&identity.secret_key_hex()).unwrap();
        assert_eq!(identity.public_key_hex(), restored.public_key_hex());
    }

    #[test]
    fn test_generate_is_unique() {
        let a = FeedIdentity::generate();
        let b = FeedIdentity::generate();
        assert_ne!(a.public_key_hex(), b.public_key_hex());
    }

    #[test]
    fn test_npub_matches_public_key() {
        let identity = FeedIdentity::generate();
        let npub = identity.npub().unwrap();
        assert!(npub.starts_with("npub1"));

        let from_hex = npub_from_hex(&identity.public_key_hex()).unwrap();
        assert_eq!(npub, from_hex);
    }

    #[test]
    fn test_from_secret_hex_rejects_garbage() {
        assert!(FeedIdentity::from_secret_hex("not a key").is_err());
    }
}
