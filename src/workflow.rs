//! Signing workflow
//!
//! The session calls into a [`ResponseHandler`] when the wallet approves the
//! session and when it returns signed transactions. [`SigningController`] is
//! the handler the CLI uses: it asks for confirmation, builds a payment from
//! the first approved account to itself and submits whatever comes back.

use std::io;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use thiserror::Error;
use tracing::{info, warn};

use crate::chain::{Address, ChainClient, ChainError, NetworkParams, TxId};
use crate::config::BridgeConfig;
use crate::crypto::Topic;
use crate::error::Error;
use crate::session::rpc::{SessionApproval, WalletTransaction};
use crate::transport::TransportError;

/// Workflow errors
#[derive(Error, Debug)]
pub enum WorkflowError {
    /// Confirmation prompt failed
    #[error("confirmation failed")]
    Confirmation(#[source] io::Error),

    /// Chain parameters unavailable
    #[error("could not fetch network parameters")]
    NetworkParameters(#[source] ChainError),

    /// Transaction could not be built
    #[error("could not build transaction")]
    BuildTransaction(#[source] ChainError),

    /// Signing request could not be sent
    #[error("could not send signing request to {peer}")]
    Send {
        /// Wallet topic
        peer: Topic,
        /// Transport error
        #[source]
        source: TransportError,
    },

    /// Wallet approved without telling us where to reach it
    #[error("session approval carries no peer id")]
    MissingPeerId,

    /// Handler produced no signing request
    #[error("nothing to sign")]
    NothingToSign,

    /// Wallet declined every transaction
    #[error("wallet returned no signed transactions")]
    NothingSigned,
}

/// Which signed transactions to submit
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SubmissionPolicy {
    /// Stop after the first successful submission
    #[default]
    First,
    /// Submit every signed transaction once, in order
    All,
}

/// Unsigned transaction offered to the wallet
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SigningRequest {
    /// Account expected to sign
    pub sender: Address,
    /// Parameters the transaction was built with
    pub params: NetworkParams,
    /// Note bytes
    pub note: Vec<u8>,
    /// Encoded unsigned transaction
    pub txn: Vec<u8>,
}

impl SigningRequest {
    /// Wire form for `algo_signTxn`
    pub fn to_wallet_transaction(&self) -> WalletTransaction {
        WalletTransaction {
            txn: BASE64.encode(&self.txn),
            message: None,
        }
    }
}

/// Signed transactions in request order; `None` where the wallet declined
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SignedTransactionSet {
    entries: Vec<Option<Vec<u8>>>,
}

impl SignedTransactionSet {
    /// Wrap decoded entries
    pub fn new(entries: Vec<Option<Vec<u8>>>) -> Self {
        SignedTransactionSet { entries }
    }

    /// Number of entries, gaps included
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// No entries at all
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Present entries with their position
    pub fn signed(&self) -> impl Iterator<Item = (usize, &[u8])> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(i, entry)| entry.as_deref().map(|bytes| (i, bytes)))
    }
}

/// Gate before anything is sent to the wallet
#[async_trait]
pub trait Confirmation: Send {
    /// Return once the user agreed
    async fn confirm(&mut self, prompt: &str) -> io::Result<()>;
}

/// Confirmation that never waits
#[derive(Clone, Copy, Debug, Default)]
pub struct AutoConfirm;

#[async_trait]
impl Confirmation for AutoConfirm {
    async fn confirm(&mut self, _prompt: &str) -> io::Result<()> {
        Ok(())
    }
}

/// Reacts to session events
#[async_trait]
pub trait ResponseHandler: Send {
    /// The wallet approved the session with at least one account.
    /// Returns the transactions to put in the single signing request.
    async fn on_session_approval(
        &mut self,
        approval: &SessionApproval,
    ) -> Result<Vec<SigningRequest>, Error>;

    /// The wallet answered the signing request
    async fn on_sign_response(
        &mut self,
        signed: &SignedTransactionSet,
    ) -> Result<Vec<TxId>, Error>;
}

/// Handler that signs one self-payment and submits the result
pub struct SigningController<C, G> {
    chain: C,
    confirmation: G,
    policy: SubmissionPolicy,
    note: Vec<u8>,
}

impl<C: ChainClient, G: Confirmation> SigningController<C, G> {
    /// Create a controller with the default policy and note
    pub fn new(chain: C, confirmation: G) -> Self {
        SigningController {
            chain,
            confirmation,
            policy: SubmissionPolicy::default(),
            note: crate::config::DEFAULT_NOTE.as_bytes().to_vec(),
        }
    }

    /// Set the submission policy
    pub fn with_policy(mut self, policy: SubmissionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the note
    pub fn with_note(mut self, note: impl Into<Vec<u8>>) -> Self {
        self.note = note.into();
        self
    }

    /// Create a controller with the policy and note from `config`
    pub fn from_config(chain: C, confirmation: G, config: &BridgeConfig) -> Self {
        SigningController::new(chain, confirmation)
            .with_policy(config.submission_policy)
            .with_note(config.note.clone())
    }
}

#[async_trait]
impl<C: ChainClient, G: Confirmation> ResponseHandler for SigningController<C, G> {
    async fn on_session_approval(
        &mut self,
        approval: &SessionApproval,
    ) -> Result<Vec<SigningRequest>, Error> {
        let account = approval
            .accounts
            .first()
            .ok_or(WorkflowError::NothingToSign)?;
        let sender: Address = account.parse().map_err(WorkflowError::BuildTransaction)?;

        self.confirmation
            .confirm(&format!("Press Enter to send a test transaction from {}", account))
            .await
            .map_err(WorkflowError::Confirmation)?;

        let params = self
            .chain
            .network_parameters()
            .await
            .map_err(WorkflowError::NetworkParameters)?;
        let txn = self
            .chain
            .build_payment(&sender, &sender, &params, &self.note)
            .map_err(WorkflowError::BuildTransaction)?;

        Ok(vec![SigningRequest {
            sender,
            params,
            note: self.note.clone(),
            txn,
        }])
    }

    async fn on_sign_response(
        &mut self,
        signed: &SignedTransactionSet,
    ) -> Result<Vec<TxId>, Error> {
        let present = signed.signed().count();
        let mut submitted = Vec::new();

        for (index, bytes) in signed.signed() {
            let id = self
                .chain
                .submit(bytes)
                .await
                .map_err(|source| Error::Submission { index, source })?;
            info!(%id, index, "transaction submitted");
            submitted.push(id);

            if self.policy == SubmissionPolicy::First {
                if present > 1 {
                    warn!(skipped = present - 1, "submitting the first signed transaction only");
                }
                break;
            }
        }

        if submitted.is_empty() {
            return Err(WorkflowError::NothingSigned.into());
        }
        Ok(submitted)
    }
}
