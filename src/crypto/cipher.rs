//! Relay envelope encryption
//!
//! Payloads travel through the relay as `{"data", "hmac", "iv"}` objects:
//! AES-256-CBC with PKCS#7 padding, authenticated by HMAC-SHA256 over
//! `ciphertext || iv` keyed with the session key. The MAC is verified in
//! constant time before any decryption happens.

use aes::Aes256;
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use super::error::{CryptoError, CryptoResult};
use super::keys::SessionKey;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;
type HmacSha256 = Hmac<Sha256>;

/// Size of the IV in bytes
pub const IV_SIZE: usize = 16;

/// Size of the HMAC tag in bytes
pub const TAG_SIZE: usize = 32;

/// Encrypted payload as carried inside a relay frame
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedPayload {
    /// Hex ciphertext
    pub data: String,
    /// Hex HMAC-SHA256 tag
    pub hmac: String,
    /// Hex IV
    pub iv: String,
}

/// Symmetric cipher for relay payloads
pub struct Cipher;

impl Cipher {
    /// Encrypt with a random IV
    pub fn encrypt(key: &SessionKey, plaintext: &[u8]) -> EncryptedPayload {
        let mut iv = [0u8; IV_SIZE];
        rand::thread_rng().fill_bytes(&mut iv);
        Self::encrypt_with_iv(key, &iv, plaintext)
    }

    /// Encrypt with a specific IV
    ///
    /// WARNING: reusing an IV with the same key leaks plaintext equality.
    pub fn encrypt_with_iv(
        key: &SessionKey,
        iv: &[u8; IV_SIZE],
        plaintext: &[u8],
    ) -> EncryptedPayload {
        let data = Aes256CbcEnc::new(key.as_bytes().into(), iv.into())
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext);
        let tag = Self::tag(key, &data, iv);

        EncryptedPayload {
            data: hex::encode(&data),
            hmac: hex::encode(tag),
            iv: hex::encode(iv),
        }
    }

    /// Verify and decrypt a payload
    pub fn decrypt(key: &SessionKey, payload: &EncryptedPayload) -> CryptoResult<Vec<u8>> {
        let data = hex::decode(&payload.data)
            .map_err(|_| CryptoError::MalformedEnvelope("data is not hex".to_string()))?;
        let tag = hex::decode(&payload.hmac)
            .map_err(|_| CryptoError::MalformedEnvelope("hmac is not hex".to_string()))?;
        let iv: [u8; IV_SIZE] = hex::decode(&payload.iv)
            .ok()
            .and_then(|iv| iv.try_into().ok())
            .ok_or_else(|| CryptoError::MalformedEnvelope("iv must be 16 hex bytes".to_string()))?;

        let mut mac = Self::mac(key);
        mac.update(&data);
        mac.update(&iv);
        mac.verify_slice(&tag)
            .map_err(|_| CryptoError::DecryptionFailed)?;

        Aes256CbcDec::new(key.as_bytes().into(), (&iv).into())
            .decrypt_padded_vec_mut::<Pkcs7>(&data)
            .map_err(|_| CryptoError::DecryptionFailed)
    }

    /// Encrypt and serialize to the JSON string placed in a relay frame
    pub fn seal(key: &SessionKey, plaintext: &[u8]) -> String {
        let payload = Self::encrypt(key, plaintext);
        serde_json::to_string(&payload).expect("encrypted payload always serializes")
    }

    /// Parse a relay frame payload and decrypt it
    pub fn open(key: &SessionKey, sealed: &str) -> CryptoResult<Vec<u8>> {
        let payload: EncryptedPayload = serde_json::from_str(sealed)
            .map_err(|e| CryptoError::MalformedEnvelope(e.to_string()))?;
        Self::decrypt(key, &payload)
    }

    fn tag(key: &SessionKey, data: &[u8], iv: &[u8]) -> [u8; TAG_SIZE] {
        let mut mac = Self::mac(key);
        mac.update(data);
        mac.update(iv);

        let mut tag = [0u8; TAG_SIZE];
        tag.copy_from_slice(&mac.finalize().into_bytes());
        tag
    }

    fn mac(key: &SessionKey) -> HmacSha256 {
        // HMAC accepts keys of any length
        <HmacSha256 as Mac>::new_from_slice(key.as_bytes()).expect("HMAC takes any key size")
    }
}
