//! Top-level error type
//!
//! Every variant names the phase that failed and keeps its cause, so the
//! printed chain reads like "signing workflow failed: could not fetch
//! network parameters: HTTP request failed: ...".

use thiserror::Error;

use crate::chain::ChainError;
use crate::crypto::CryptoError;
use crate::transport::TransportError;
use crate::workflow::WorkflowError;

/// Session error
#[derive(Error, Debug)]
pub enum Error {
    /// Key or topic generation failed
    #[error("key generation failed")]
    Entropy(#[source] CryptoError),

    /// Could not reach the relay
    #[error("could not connect to relay at {url}")]
    Connect {
        /// Socket URL that was dialled
        url: String,
        /// Underlying transport error
        #[source]
        source: TransportError,
    },

    /// Subscribing or publishing failed
    #[error("relay transport error")]
    Transport(#[source] TransportError),

    /// Receive failed or timed out
    #[error("failed to receive from relay")]
    Receive(#[source] TransportError),

    /// Envelope could not be authenticated or decrypted
    ///
    /// Recovered inside the receive loop; only surfaces from direct calls.
    #[error("failed to decrypt relay envelope")]
    Decrypt(#[source] CryptoError),

    /// Session request could not be sent
    #[error("session negotiation failed")]
    Negotiation(#[source] TransportError),

    /// Confirmation, parameter lookup, transaction building or sending the signing request failed
    #[error("signing workflow failed")]
    Workflow(#[from] WorkflowError),

    /// A signed transaction was rejected by the chain
    #[error("failed to submit signed transaction #{index}")]
    Submission {
        /// Position in the signing response
        index: usize,
        /// Chain error
        #[source]
        source: ChainError,
    },
}

impl Error {
    /// Whether the relay went quiet for longer than the receive timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Receive(e) if e.is_timeout())
    }
}

/// Result type for session operations
pub type Result<T> = std::result::Result<T, Error>;
