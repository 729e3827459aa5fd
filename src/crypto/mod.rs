//! Cryptographic primitives for the session bridge
//!
//! - `keys`: session key and topic generation
//! - `cipher`: AES-256-CBC + HMAC-SHA256 relay envelopes

pub mod cipher;
pub mod error;
pub mod keys;

// Re-export commonly used types
pub use cipher::{Cipher, EncryptedPayload};
pub use error::{CryptoError, CryptoResult};
pub use keys::{generate_key, generate_topic, SessionKey, Topic, KEY_SIZE};

#[cfg(test)]
mod integration_tests {
    use super::*;

    #[test]
    fn test_peer_reads_what_client_seals() {
        // The client generates the key and shares its hex through the URI
        let client_key = generate_key().unwrap();
        let wallet_key = SessionKey::from_hex(&client_key.to_hex()).unwrap();

        let request = br#"{"id":1,"jsonrpc":"2.0","method":"wc_sessionRequest","params":[]}"#;
        let sealed = Cipher::seal(&client_key, request);

        let opened = Cipher::open(&wallet_key, &sealed).unwrap();
        assert_eq!(opened, request);
    }

    #[test]
    fn test_foreign_session_cannot_read() {
        let ours = generate_key().unwrap();
        let theirs = generate_key().unwrap();

        let sealed = Cipher::seal(&theirs, b"someone else's traffic");
        assert_eq!(
            Cipher::open(&ours, &sealed),
            Err(CryptoError::DecryptionFailed)
        );
    }
}
