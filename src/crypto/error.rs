//! Cryptographic error types

use thiserror::Error;

/// Errors that can occur in cryptographic operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// The operating system random source failed or is unavailable
    #[error("Random source unavailable: {0}")]
    Entropy(String),

    /// The provided key has an invalid length
    #[error("Invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// Expected key length in bytes
        expected: usize,
        /// Actual key length in bytes
        actual: usize,
    },

    /// The key is not valid hex
    #[error("Invalid key encoding")]
    InvalidKeyEncoding,

    /// The envelope is not a well-formed `{data, hmac, iv}` object
    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// Decryption failed - HMAC mismatch or bad padding (possibly tampered data or a foreign key)
    #[error("Decryption failed: authentication tag mismatch")]
    DecryptionFailed,

    /// The session key was wiped when the connection closed
    #[error("Session key released")]
    KeyReleased,
}

/// Result type for cryptographic operations
pub type CryptoResult<T> = Result<T, CryptoError>;
