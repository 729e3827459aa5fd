//! Session configuration

use std::time::Duration;

use crate::session::rpc::PeerMeta;
use crate::transport::websocket::socket_url;
use crate::workflow::SubmissionPolicy;

/// Public bridge used when none is configured
pub const DEFAULT_BRIDGE_URL: &str = "https://a.bridge.walletconnect.org";

/// Public algod node used when none is configured
pub const DEFAULT_ALGOD_URL: &str = "https://mainnet-api.algonode.cloud";

/// Note attached to the test transaction
pub const DEFAULT_NOTE: &str = "test transaction";

/// Bridge client configuration
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Bridge URL (HTTP form, shared with the wallet)
    pub bridge_url: String,
    /// Algod node URL
    pub algod_url: String,
    /// Algod API token
    pub algod_token: Option<String>,
    /// Metadata the wallet shows about us
    pub peer_meta: PeerMeta,
    /// Give up when the relay is silent this long; `None` waits forever
    pub receive_timeout: Option<Duration>,
    /// Give up dialling the relay after this long
    pub connect_timeout: Duration,
    /// Note bytes for the signing request
    pub note: Vec<u8>,
    /// What to do with multi-transaction signing responses
    pub submission_policy: SubmissionPolicy,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            bridge_url: DEFAULT_BRIDGE_URL.to_string(),
            algod_url: DEFAULT_ALGOD_URL.to_string(),
            algod_token: None,
            peer_meta: PeerMeta {
                name: "wc".to_string(),
                description: "WalletConnect Rust".to_string(),
                url: String::new(),
                icons: Vec::new(),
            },
            receive_timeout: Some(Duration::from_secs(300)),
            connect_timeout: Duration::from_secs(30),
            note: DEFAULT_NOTE.as_bytes().to_vec(),
            submission_policy: SubmissionPolicy::default(),
        }
    }
}

impl BridgeConfig {
    /// Defaults with a custom bridge
    pub fn new(bridge_url: impl Into<String>) -> Self {
        Self {
            bridge_url: bridge_url.into(),
            ..Self::default()
        }
    }

    /// Set the algod node and token
    pub fn with_algod(mut self, url: impl Into<String>, token: Option<String>) -> Self {
        self.algod_url = url.into();
        self.algod_token = token;
        self
    }

    /// Set the displayed metadata
    pub fn with_peer_meta(mut self, meta: PeerMeta) -> Self {
        self.peer_meta = meta;
        self
    }

    /// Set the receive timeout
    pub fn with_receive_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.receive_timeout = timeout;
        self
    }

    /// Set the connect timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the transaction note
    pub fn with_note(mut self, note: impl Into<Vec<u8>>) -> Self {
        self.note = note.into();
        self
    }

    /// Set the submission policy
    pub fn with_submission_policy(mut self, policy: SubmissionPolicy) -> Self {
        self.submission_policy = policy;
        self
    }

    /// WebSocket URL derived from the bridge URL
    pub fn socket_url(&self) -> String {
        socket_url(&self.bridge_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert_eq!(config.socket_url(), "wss://a.bridge.walletconnect.org");
        assert_eq!(config.note, b"test transaction");
        assert_eq!(config.submission_policy, SubmissionPolicy::First);
        assert_eq!(config.receive_timeout, Some(Duration::from_secs(300)));
    }

    #[test]
    fn test_builder() {
        let config = BridgeConfig::new("http://localhost:5001")
            .with_receive_timeout(None)
            .with_note("hello")
            .with_submission_policy(SubmissionPolicy::All);

        assert_eq!(config.socket_url(), "ws://localhost:5001");
        assert_eq!(config.receive_timeout, None);
        assert_eq!(config.note, b"hello");
        assert_eq!(config.submission_policy, SubmissionPolicy::All);
        assert_eq!(config.algod_url, DEFAULT_ALGOD_URL);
    }
}
