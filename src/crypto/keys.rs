//! Session key material
//!
//! Every session is bootstrapped from two random values: a 256-bit symmetric
//! key that encrypts all relay payloads, and a topic that routes them. Both
//! are drawn from the operating system CSPRNG through a fallible fill, so an
//! exhausted or missing entropy source surfaces as [`CryptoError::Entropy`]
//! instead of a panic.

use std::fmt;

use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::ZeroizeOnDrop;

use super::error::{CryptoError, CryptoResult};

/// Size of the session key in bytes
pub const KEY_SIZE: usize = 32;

/// Symmetric key shared with the peer through the session URI.
///
/// The key is automatically zeroized when dropped.
#[derive(ZeroizeOnDrop)]
pub struct SessionKey([u8; KEY_SIZE]);

impl SessionKey {
    /// Generate a fresh key from the OS random source
    pub fn generate() -> CryptoResult<Self> {
        let mut bytes = [0u8; KEY_SIZE];
        fill_secure(&mut bytes)?;
        Ok(SessionKey(bytes))
    }

    /// Create from raw bytes
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() != KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength {
                expected: KEY_SIZE,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; KEY_SIZE];
        arr.copy_from_slice(bytes);
        Ok(SessionKey(arr))
    }

    /// Create from hex, as carried in the `key` parameter of a session URI
    pub fn from_hex(s: &str) -> CryptoResult<Self> {
        let bytes = hex::decode(s).map_err(|_| CryptoError::InvalidKeyEncoding)?;
        Self::from_bytes(&bytes)
    }

    /// Get raw bytes
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    /// Convert to hex
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionKey(..)")
    }
}

/// Opaque routing identifier for a pub/sub channel on the relay.
///
/// Topics generated locally are UUID v4 strings. Topics learned from the
/// peer (its peer id) are taken verbatim.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Topic(String);

impl Topic {
    /// Generate a fresh random topic
    pub fn generate() -> CryptoResult<Self> {
        let mut bytes = [0u8; 16];
        fill_secure(&mut bytes)?;
        let id = uuid::Builder::from_random_bytes(bytes).into_uuid();
        Ok(Topic(id.to_string()))
    }

    /// Borrow the topic string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Topic {
    fn from(s: String) -> Self {
        Topic(s)
    }
}

impl From<&str> for Topic {
    fn from(s: &str) -> Self {
        Topic(s.to_string())
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Generate the session key
pub fn generate_key() -> CryptoResult<SessionKey> {
    SessionKey::generate()
}

/// Generate the session topic
pub fn generate_topic() -> CryptoResult<Topic> {
    Topic::generate()
}

fn fill_secure(buf: &mut [u8]) -> CryptoResult<()> {
    OsRng
        .try_fill_bytes(buf)
        .map_err(|e| CryptoError::Entropy(e.to_string()))
}
