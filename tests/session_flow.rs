//! End-to-end session scenarios against a scripted wallet
//!
//! The wallet side is played through the in-memory relay: it reads what the
//! session publishes, decrypts it with the key from the session URI and
//! answers the way a real wallet would.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Serialize;
use serde_json::{json, Value};

use wc_lite::chain::{Address, ChainClient, ChainResult, NetworkParams, TxId};
use wc_lite::crypto::{Cipher, SessionKey};
use wc_lite::session::rpc::{JsonRpcErrorResponse, JsonRpcResponse};
use wc_lite::transport::memory::{self, MemoryRelay, MemoryTransport};
use wc_lite::transport::{FrameKind, SocketMessage};
use wc_lite::workflow::{
    AutoConfirm, ResponseHandler, SignedTransactionSet, SigningController, SigningRequest,
};
use wc_lite::{
    BridgeConfig, Error, Session, SessionOutcome, SessionState, SessionUri, SubmissionPolicy,
};

const WALLET_TOPIC: &str = "wallet-peer-topic";

/// Chain that records submissions
#[derive(Clone, Default)]
struct RecordingChain {
    submitted: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl RecordingChain {
    fn submitted(&self) -> Vec<Vec<u8>> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChainClient for RecordingChain {
    async fn network_parameters(&self) -> ChainResult<NetworkParams> {
        Ok(NetworkParams {
            fee: 0,
            min_fee: 1000,
            first_valid: 5000,
            last_valid: 6000,
            genesis_id: "testnet-v1.0".to_string(),
            genesis_hash: [3u8; 32],
        })
    }

    async fn submit(&self, signed: &[u8]) -> ChainResult<TxId> {
        let mut submitted = self.submitted.lock().unwrap();
        submitted.push(signed.to_vec());
        Ok(TxId(format!("TX-{}", submitted.len())))
    }
}

/// Scripted wallet on the relay side of the in-memory pair
struct Wallet {
    relay: MemoryRelay,
    key: SessionKey,
    topic: String,
    session_request_id: u64,
}

impl Wallet {
    /// Read the session request the way a wallet does after scanning the URI
    async fn scan(mut relay: MemoryRelay, uri: &SessionUri) -> Self {
        let key = uri.session_key().unwrap();
        let frame = loop {
            let frame = relay.next_sent().await.expect("session request");
            if frame.kind == FrameKind::Pub {
                break frame;
            }
        };
        let request: Value = serde_json::from_slice(&Cipher::open(&key, &frame.payload).unwrap())
            .unwrap();
        assert_eq!(request["method"], "wc_sessionRequest");

        Wallet {
            relay,
            key,
            topic: uri.topic.to_string(),
            session_request_id: request["id"].as_u64().unwrap(),
        }
    }

    fn send(&self, message: &impl Serialize) {
        let sealed = Cipher::seal(&self.key, &serde_json::to_vec(message).unwrap());
        self.relay
            .deliver(SocketMessage::publish(self.topic.as_str(), sealed))
            .unwrap();
    }

    fn approve(&self, accounts: &[String]) {
        self.send(&JsonRpcResponse::new(
            self.session_request_id,
            json!({
                "approved": true,
                "chainId": 4160,
                "networkId": 0,
                "accounts": accounts,
                "rpcUrl": "",
                "peerId": WALLET_TOPIC,
                "peerMeta": {"name": "Mock Wallet", "description": "", "url": "", "icons": []}
            }),
        ));
    }

    /// Next published request, with the topic it was sent to
    async fn next_request(&mut self) -> (String, Value) {
        loop {
            let frame = self.relay.next_sent().await.expect("request");
            if frame.kind != FrameKind::Pub {
                continue;
            }
            let value = serde_json::from_slice(&Cipher::open(&self.key, &frame.payload).unwrap())
                .unwrap();
            return (frame.topic, value);
        }
    }

    fn published(&mut self) -> Vec<SocketMessage> {
        self.relay
            .drain_sent()
            .into_iter()
            .filter(|frame| frame.kind == FrameKind::Pub)
            .collect()
    }
}

async fn open_session(config: &BridgeConfig) -> (Session<MemoryTransport>, Wallet) {
    let (transport, relay) = memory::create_pair();
    let mut session = Session::with_transport(transport, config).unwrap();

    let uri = session.request_session(&config.peer_meta).await.unwrap();
    session.subscribe().await.unwrap();

    let wallet = Wallet::scan(relay, &uri).await;
    (session, wallet)
}

fn account() -> String {
    Address::new([7u8; 32]).to_string()
}

fn signed_entries() -> Vec<String> {
    vec![BASE64.encode([0xAA, 1]), BASE64.encode([0xBB, 2])]
}

#[tokio::test]
async fn test_scenario_a_one_signing_request_to_peer() {
    let config = BridgeConfig::default().with_receive_timeout(None);
    let (mut session, mut wallet) = open_session(&config).await;
    let chain = RecordingChain::default();
    let mut controller = SigningController::new(chain.clone(), AutoConfirm);

    let (outcome, ()) = tokio::join!(
        session.run(&mut controller, std::future::pending()),
        async {
            wallet.approve(&[account()]);

            let (topic, request) = wallet.next_request().await;
            assert_eq!(topic, WALLET_TOPIC);
            assert_eq!(request["method"], "algo_signTxn");

            let txns = request["params"][0].as_array().unwrap();
            assert_eq!(txns.len(), 1);
            let txn = BASE64.decode(txns[0]["txn"].as_str().unwrap()).unwrap();
            assert_eq!(txn[0] & 0xf0, 0x80);

            // End the run so the test can inspect what was published
            wallet.send(&JsonRpcErrorResponse::new(
                request["id"].as_u64().unwrap(),
                4001,
                "User rejected",
            ));
        }
    );

    assert_eq!(
        outcome.unwrap(),
        SessionOutcome::Rejected {
            reason: "User rejected".to_string()
        }
    );
    assert!(wallet.published().is_empty());
    assert!(chain.submitted().is_empty());
}

#[tokio::test]
async fn test_scenario_b_first_policy_submits_once() {
    let config = BridgeConfig::default().with_receive_timeout(None);
    let (mut session, mut wallet) = open_session(&config).await;
    let chain = RecordingChain::default();
    let mut controller = SigningController::new(chain.clone(), AutoConfirm);

    let (outcome, ()) = tokio::join!(
        session.run(&mut controller, std::future::pending()),
        async {
            wallet.approve(&[account()]);
            let (_, request) = wallet.next_request().await;
            wallet.send(&JsonRpcResponse::new(
                request["id"].as_u64().unwrap(),
                signed_entries(),
            ));
        }
    );

    assert_eq!(
        outcome.unwrap(),
        SessionOutcome::Completed {
            tx_ids: vec![TxId("TX-1".to_string())]
        }
    );
    assert_eq!(chain.submitted(), vec![vec![0xAA, 1]]);
    assert!(matches!(session.state(), SessionState::Done { .. }));
}

#[tokio::test]
async fn test_scenario_b_all_policy_submits_each_once_in_order() {
    let config = BridgeConfig::default()
        .with_receive_timeout(None)
        .with_submission_policy(SubmissionPolicy::All);
    let (mut session, mut wallet) = open_session(&config).await;
    let chain = RecordingChain::default();
    let mut controller = SigningController::new(chain.clone(), AutoConfirm)
        .with_policy(config.submission_policy);

    let (outcome, ()) = tokio::join!(
        session.run(&mut controller, std::future::pending()),
        async {
            wallet.approve(&[account()]);
            let (_, request) = wallet.next_request().await;
            wallet.send(&JsonRpcResponse::new(
                request["id"].as_u64().unwrap(),
                signed_entries(),
            ));
        }
    );

    match outcome.unwrap() {
        SessionOutcome::Completed { tx_ids } => assert_eq!(tx_ids.len(), 2),
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(chain.submitted(), vec![vec![0xAA, 1], vec![0xBB, 2]]);
}

#[tokio::test]
async fn test_empty_accounts_terminates_without_signing_request() {
    let config = BridgeConfig::default().with_receive_timeout(None);
    let (mut session, mut wallet) = open_session(&config).await;
    let chain = RecordingChain::default();
    let mut controller = SigningController::new(chain.clone(), AutoConfirm);

    wallet.approve(&[]);
    let outcome = session
        .run(&mut controller, std::future::pending())
        .await
        .unwrap();

    assert!(matches!(outcome, SessionOutcome::Rejected { .. }));
    assert!(wallet.published().is_empty());
    assert!(chain.submitted().is_empty());
}

/// Records the order callbacks arrive in
#[derive(Default)]
struct EventLog {
    events: Vec<String>,
}

#[async_trait]
impl ResponseHandler for EventLog {
    async fn on_session_approval(
        &mut self,
        approval: &wc_lite::session::SessionApproval,
    ) -> wc_lite::Result<Vec<SigningRequest>> {
        self.events
            .push(format!("approval:{}", approval.accounts.join(",")));
        let sender = Address::new([7u8; 32]);
        Ok(vec![SigningRequest {
            sender,
            params: RecordingChain::default().network_parameters().await.unwrap(),
            note: Vec::new(),
            txn: vec![0x80],
        }])
    }

    async fn on_sign_response(
        &mut self,
        signed: &SignedTransactionSet,
    ) -> wc_lite::Result<Vec<TxId>> {
        self.events.push(format!("signed:{}", signed.len()));
        Ok(vec![TxId("X".to_string())])
    }
}

#[tokio::test]
async fn test_messages_handled_in_arrival_order() {
    let config = BridgeConfig::default().with_receive_timeout(None);
    let (mut session, mut wallet) = open_session(&config).await;
    let mut log = EventLog::default();

    let (outcome, ()) = tokio::join!(
        session.run(&mut log, std::future::pending()),
        async {
            // E1: noise, E2: approval for A, E3: a late second approval for B
            wallet.send(&json!({"id": 1, "jsonrpc": "2.0", "result": "noise"}));
            wallet.approve(&["A".to_string()]);
            wallet.approve(&["B".to_string()]);

            let (_, request) = wallet.next_request().await;
            wallet.send(&JsonRpcResponse::new(
                request["id"].as_u64().unwrap(),
                vec![Some(BASE64.encode([1])), None],
            ));
        }
    );

    assert!(matches!(outcome.unwrap(), SessionOutcome::Completed { .. }));
    assert_eq!(log.events, vec!["approval:A", "signed:2"]);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_messages_do_not_change_state() {
    let config = BridgeConfig::default().with_receive_timeout(None);
    let (mut session, wallet) = open_session(&config).await;
    let mut log = EventLog::default();

    wallet.send(&json!({"id": 42, "jsonrpc": "2.0", "result": {"approved": true}}));
    wallet.send(&json!({"id": 43, "jsonrpc": "2.0", "method": "wc_unknownMethod", "params": []}));
    wallet.send(&json!(["not", "rpc"]));
    wallet.send(&json!({"id": 44, "jsonrpc": "2.0", "result": null}));
    // Foreign traffic on the same topic
    let foreign = SessionKey::from_bytes(&[0x55; 32]).unwrap();
    wallet
        .relay
        .deliver(SocketMessage::publish(
            wallet.topic.as_str(),
            Cipher::seal(&foreign, b"{}"),
        ))
        .unwrap();

    // The clock only advances once the queue is drained and the loop is idle
    let outcome = session
        .run(&mut log, tokio::time::sleep(Duration::from_secs(1)))
        .await
        .unwrap();

    assert_eq!(outcome, SessionOutcome::Cancelled);
    assert!(log.events.is_empty());
    assert_eq!(session.pending_requests(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_receive_timeout_while_awaiting_approval() {
    let config = BridgeConfig::default().with_receive_timeout(Some(Duration::from_secs(60)));
    let (mut session, _wallet) = open_session(&config).await;
    let mut controller = SigningController::new(RecordingChain::default(), AutoConfirm);

    let err = session
        .run(&mut controller, std::future::pending())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Receive(_)));
    assert!(err.is_timeout());
    assert_eq!(session.state(), &SessionState::Failed);
}

#[tokio::test]
async fn test_cancellation_while_waiting() {
    let config = BridgeConfig::default().with_receive_timeout(None);
    let (mut session, _wallet) = open_session(&config).await;
    let mut controller = SigningController::new(RecordingChain::default(), AutoConfirm);

    let (tx, rx) = tokio::sync::oneshot::channel::<()>();
    let (outcome, ()) = tokio::join!(
        session.run(&mut controller, async {
            let _ = rx.await;
        }),
        async {
            tokio::task::yield_now().await;
            tx.send(()).unwrap();
        }
    );

    assert_eq!(outcome.unwrap(), SessionOutcome::Cancelled);
    assert_eq!(session.state(), &SessionState::Cancelled);
}
