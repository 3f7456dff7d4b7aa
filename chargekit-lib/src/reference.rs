//! Reference key generation.
//!
//! A reference is a one-time correlation key embedded in a payment
//! transaction so the transaction can be located on the ledger without prior
//! knowledge of its signature. References are the public half of a fresh
//! ed25519 keypair: 32 bytes of OS randomness behind a key derivation, well
//! past the 128 bits of entropy needed to make collisions negligible.

use ed25519_dalek::SigningKey;
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// A one-time correlation key for locating a payment on the ledger.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference(pub String);

impl Reference {
    /// Create a reference from an already-encoded key string.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Generate a fresh reference.
    ///
    /// Draws 32 bytes from the OS RNG, derives an ed25519 verifying key from
    /// them, and hex-encodes the public key. Pure with respect to any
    /// lifecycle state; the signing half is discarded immediately since only
    /// the public identifier is ever used.
    pub fn generate() -> Self {
        let mut seed = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut seed);
        let signing = SigningKey::from_bytes(&seed);
        Self(hex::encode(signing.verifying_key().as_bytes()))
    }

    /// Get the reference as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Reference {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Reference {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for Reference {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Reference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
