//! Chain collaborator
//!
//! The session core only needs three things from a chain: suggested network
//! parameters, a way to turn them into an unsigned transaction, and a way
//! to submit signed bytes. [`ChainClient`] is that seam; [`AlgodClient`]
//! implements it against an Algorand node.

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

pub mod algod;
pub mod txn;

pub use algod::AlgodClient;
pub use txn::{Address, PaymentTxn, MAX_NOTE_SIZE};

/// Chain errors
#[derive(Error, Debug)]
pub enum ChainError {
    /// Request never got a response
    #[error("HTTP request failed")]
    Http(#[from] reqwest::Error),

    /// Node answered with a non-success status
    #[error("Node returned {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, usually a JSON `message`
        body: String,
    },

    /// Response body did not have the expected shape
    #[error("Unexpected response: {0}")]
    Decode(String),

    /// Not a valid account address
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Transaction could not be built
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),

    /// Client misconfigured
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for chain operations
pub type ChainResult<T> = Result<T, ChainError>;

/// Suggested parameters for a new transaction
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NetworkParams {
    /// Suggested fee per byte
    pub fee: u64,
    /// Minimum flat fee
    pub min_fee: u64,
    /// First round the transaction is valid
    pub first_valid: u64,
    /// Last round the transaction is valid
    pub last_valid: u64,
    /// Genesis id, e.g. `mainnet-v1.0`
    pub genesis_id: String,
    /// Genesis hash
    pub genesis_hash: [u8; 32],
}

/// Transaction id returned by the node
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TxId(pub String);

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Narrow chain interface used by the signing workflow
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Fetch suggested parameters for a new transaction
    async fn network_parameters(&self) -> ChainResult<NetworkParams>;

    /// Submit one signed transaction
    async fn submit(&self, signed: &[u8]) -> ChainResult<TxId>;

    /// Encode an unsigned zero-amount payment from `from` to `to`
    fn build_payment(
        &self,
        from: &Address,
        to: &Address,
        params: &NetworkParams,
        note: &[u8],
    ) -> ChainResult<Vec<u8>> {
        PaymentTxn::new(*from, *to, params, note)?.encode()
    }
}
