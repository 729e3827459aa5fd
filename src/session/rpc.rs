//! JSON-RPC vocabulary carried inside relay envelopes

use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::crypto::Topic;

/// Method of the session handshake request
pub const SESSION_REQUEST: &str = "wc_sessionRequest";

/// Method the wallet uses to change or end an approved session
pub const SESSION_UPDATE: &str = "wc_sessionUpdate";

/// Method asking the wallet to sign Algorand transactions
pub const SIGN_TRANSACTIONS: &str = "algo_signTxn";

const JSONRPC_VERSION: &str = "2.0";

/// Allocate a request id: milliseconds since the epoch, scaled, plus jitter
pub fn payload_id() -> u64 {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default();
    millis * 1000 + rand::thread_rng().gen_range(0..1000)
}

/// Outbound JSON-RPC request
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest<P> {
    /// Request id, echoed by the response
    pub id: u64,
    /// Always `"2.0"`
    pub jsonrpc: String,
    /// Method name
    pub method: String,
    /// Positional parameters
    pub params: P,
}

impl<P> JsonRpcRequest<P> {
    /// New request with a fresh id
    pub fn new(method: &str, params: P) -> Self {
        JsonRpcRequest {
            id: payload_id(),
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.to_string(),
            params,
        }
    }
}

/// Successful JSON-RPC response
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse<R> {
    /// Id of the request being answered
    pub id: u64,
    /// Always `"2.0"`
    pub jsonrpc: String,
    /// Result payload
    pub result: R,
}

impl<R> JsonRpcResponse<R> {
    /// Answer request `id`
    pub fn new(id: u64, result: R) -> Self {
        JsonRpcResponse {
            id,
            jsonrpc: JSONRPC_VERSION.to_string(),
            result,
        }
    }
}

/// Error object of a failed JSON-RPC call
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcError {
    /// Error code
    #[serde(default)]
    pub code: i64,
    /// Human readable reason
    #[serde(default)]
    pub message: String,
}

/// Failed JSON-RPC response
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonRpcErrorResponse {
    /// Id of the request being answered
    pub id: u64,
    /// Always `"2.0"`
    pub jsonrpc: String,
    /// What went wrong
    pub error: RpcError,
}

impl JsonRpcErrorResponse {
    /// Reject request `id`
    pub fn new(id: u64, code: i64, message: impl Into<String>) -> Self {
        JsonRpcErrorResponse {
            id,
            jsonrpc: JSONRPC_VERSION.to_string(),
            error: RpcError {
                code,
                message: message.into(),
            },
        }
    }
}

/// Display metadata one party shows about the other
///
/// Wallets fill these loosely; missing or `null` fields decode as empty.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerMeta {
    /// Application name
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    /// One-line description
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    /// Home page
    #[serde(default, deserialize_with = "null_as_default")]
    pub url: String,
    /// Icon URLs
    #[serde(default, deserialize_with = "null_as_default")]
    pub icons: Vec<String>,
}

/// Parameters of `wc_sessionRequest`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequestParams {
    /// Topic the requester listens on
    pub peer_id: Topic,
    /// Requester metadata
    pub peer_meta: PeerMeta,
    /// Requested chain, `null` lets the wallet pick
    pub chain_id: Option<u64>,
}

/// Result of `wc_sessionRequest`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionApproval {
    /// Whether the user approved the session
    pub approved: bool,
    /// Chain the wallet connected to
    #[serde(default)]
    pub chain_id: Option<u64>,
    /// Network the wallet connected to
    #[serde(default)]
    pub network_id: Option<u64>,
    /// Authorized accounts, may be `null`
    #[serde(default, deserialize_with = "null_as_default")]
    pub accounts: Vec<String>,
    /// RPC endpoint suggested by the wallet
    #[serde(default)]
    pub rpc_url: Option<String>,
    /// Topic the wallet listens on
    #[serde(default)]
    pub peer_id: Option<Topic>,
    /// Wallet metadata, `None` when absent or malformed
    #[serde(default, deserialize_with = "lenient_meta")]
    pub peer_meta: Option<PeerMeta>,
}

impl SessionApproval {
    /// Approved with at least one account
    pub fn is_usable(&self) -> bool {
        self.approved && !self.accounts.is_empty()
    }
}

/// Parameters of `wc_sessionUpdate`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUpdate {
    /// `false` means the wallet ended the session
    pub approved: bool,
    /// Current chain
    #[serde(default)]
    pub chain_id: Option<u64>,
    /// Current accounts
    #[serde(default, deserialize_with = "null_as_default")]
    pub accounts: Vec<String>,
}

/// One transaction offered to the wallet for signing
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletTransaction {
    /// Base64 msgpack of the unsigned transaction
    pub txn: String,
    /// Text the wallet shows next to it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Build the handshake request
pub fn session_request(
    peer_id: &Topic,
    peer_meta: &PeerMeta,
) -> JsonRpcRequest<Vec<SessionRequestParams>> {
    JsonRpcRequest::new(
        SESSION_REQUEST,
        vec![SessionRequestParams {
            peer_id: peer_id.clone(),
            peer_meta: peer_meta.clone(),
            chain_id: None,
        }],
    )
}

/// Build a signing request; params are a single transaction group
pub fn sign_transactions(
    txns: Vec<WalletTransaction>,
) -> JsonRpcRequest<Vec<Vec<WalletTransaction>>> {
    JsonRpcRequest::new(SIGN_TRANSACTIONS, vec![txns])
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// Any `peerMeta` that does not parse becomes `None`
fn lenient_meta<'de, D>(deserializer: D) -> Result<Option<PeerMeta>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_id_shape() {
        let a = payload_id();
        let b = payload_id();
        // Millisecond timestamp scaled by 1000
        assert!(a > 1_600_000_000_000_000);
        assert!(b.abs_diff(a) < 10_000_000);
    }

    #[test]
    fn test_session_request_wire_format() {
        let meta = PeerMeta {
            name: "wc".to_string(),
            description: "WalletConnect Rust".to_string(),
            url: String::new(),
            icons: vec![],
        };
        let request = session_request(&Topic::from("abc"), &meta);
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["jsonrpc"], "2.0");
        assert_eq!(value["method"], "wc_sessionRequest");
        assert_eq!(value["params"][0]["peerId"], "abc");
        assert_eq!(value["params"][0]["peerMeta"]["name"], "wc");
        assert_eq!(value["params"][0]["peerMeta"]["icons"], json!([]));
        assert!(value["params"][0]["chainId"].is_null());
        assert_eq!(value["id"].as_u64(), Some(request.id));
    }

    #[test]
    fn test_sign_request_wire_format() {
        let request = sign_transactions(vec![WalletTransaction {
            txn: "AAEC".to_string(),
            message: None,
        }]);
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["method"], "algo_signTxn");
        assert_eq!(value["params"], json!([[{"txn": "AAEC"}]]));
    }

    #[test]
    fn test_approval_tolerates_nulls() {
        let approval: SessionApproval = serde_json::from_value(json!({
            "approved": true,
            "chainId": 4160,
            "networkId": null,
            "accounts": null,
            "rpcUrl": "",
            "peerId": "wallet-topic",
            "peerMeta": {"name": "Pera", "description": "", "url": "https://perawallet.app", "icons": []}
        }))
        .unwrap();

        assert!(approval.accounts.is_empty());
        assert!(!approval.is_usable());
        assert_eq!(approval.peer_id, Some(Topic::from("wallet-topic")));
    }
}
