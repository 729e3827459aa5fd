//! Inbound message decoding
//!
//! [`decode`] maps a decrypted payload to exactly one [`InboundMessage`].
//! Responses carry no method name, so they are matched against the ids of
//! requests still waiting for an answer. Anything that does not fit is
//! [`InboundMessage::Unknown`].

use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;
use serde_json::Value;
use tracing::trace;

use super::rpc::{RpcError, SessionApproval, SessionUpdate, SESSION_UPDATE};
use crate::workflow::SignedTransactionSet;

/// What an outstanding request was for
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PendingKind {
    /// `wc_sessionRequest`
    SessionRequest,
    /// `algo_signTxn`
    SignTransactions,
}

/// Decoded inbound message
#[derive(Clone, Debug, PartialEq)]
pub enum InboundMessage {
    /// Answer to the session request
    SessionApproval {
        /// Id of the session request
        request_id: u64,
        /// Wallet's answer
        approval: SessionApproval,
    },
    /// Answer to a signing request
    SignResponse {
        /// Id of the signing request
        request_id: u64,
        /// Signed transactions, gaps where the wallet declined
        signed: SignedTransactionSet,
    },
    /// Wallet-initiated session change
    SessionUpdate(SessionUpdate),
    /// Error response to one of our requests
    RequestRejected {
        /// Id of the rejected request
        request_id: u64,
        /// What the request was for
        kind: PendingKind,
        /// Wallet's reason
        error: RpcError,
    },
    /// Anything else, including our own requests echoed back by the relay
    Unknown,
}

// Variant order matters: requests have `method`, errors have `error`,
// responses have `result`.
#[derive(Deserialize)]
#[serde(untagged)]
enum IncomingRpc {
    Request {
        method: String,
        #[serde(default)]
        params: Value,
    },
    Error {
        id: u64,
        error: RpcError,
    },
    Response {
        id: u64,
        result: Value,
    },
}

/// Decode a decrypted payload
pub fn decode(plaintext: &[u8], pending: &HashMap<u64, PendingKind>) -> InboundMessage {
    let rpc: IncomingRpc = match serde_json::from_slice(plaintext) {
        Ok(rpc) => rpc,
        Err(e) => {
            trace!(error = %e, "payload is not JSON-RPC");
            return InboundMessage::Unknown;
        }
    };

    match rpc {
        IncomingRpc::Request { method, params } if method == SESSION_UPDATE => {
            match serde_json::from_value::<Vec<SessionUpdate>>(params) {
                Ok(mut updates) if !updates.is_empty() => {
                    InboundMessage::SessionUpdate(updates.swap_remove(0))
                }
                _ => {
                    trace!("session update without usable params");
                    InboundMessage::Unknown
                }
            }
        }
        IncomingRpc::Request { method, .. } => {
            trace!(%method, "ignoring request");
            InboundMessage::Unknown
        }
        IncomingRpc::Error { id, error } => match pending.get(&id) {
            Some(&kind) => InboundMessage::RequestRejected {
                request_id: id,
                kind,
                error,
            },
            None => {
                trace!(id, "error response to unknown request");
                InboundMessage::Unknown
            }
        },
        IncomingRpc::Response { id, result } => match pending.get(&id) {
            Some(PendingKind::SessionRequest) => decode_approval(id, result),
            Some(PendingKind::SignTransactions) => decode_signed(id, result),
            None => {
                trace!(id, "response to unknown request");
                InboundMessage::Unknown
            }
        },
    }
}

fn decode_approval(request_id: u64, result: Value) -> InboundMessage {
    match serde_json::from_value(result) {
        Ok(approval) => InboundMessage::SessionApproval {
            request_id,
            approval,
        },
        Err(e) => {
            trace!(request_id, error = %e, "session response has unexpected shape");
            InboundMessage::Unknown
        }
    }
}

fn decode_signed(request_id: u64, result: Value) -> InboundMessage {
    let entries: Vec<Option<String>> = match serde_json::from_value(result) {
        Ok(entries) => entries,
        Err(e) => {
            trace!(request_id, error = %e, "signing response has unexpected shape");
            return InboundMessage::Unknown;
        }
    };

    let decoded: Result<Vec<Option<Vec<u8>>>, _> = entries
        .iter()
        .map(|entry| entry.as_deref().map(|b64| BASE64.decode(b64)).transpose())
        .collect();

    match decoded {
        Ok(entries) => InboundMessage::SignResponse {
            request_id,
            signed: SignedTransactionSet::new(entries),
        },
        Err(e) => {
            trace!(request_id, error = %e, "signed transaction is not base64");
            InboundMessage::Unknown
        }
    }
}
