//! Session lifecycle
//!
//! A [`Session`] owns everything one wallet session needs: the relay
//! connection (and with it the key), the topic, and the ids of requests
//! still waiting for an answer. It is driven by [`Session::run`], a single
//! receive loop that decrypts, decodes and dispatches one envelope at a
//! time until the session reaches a terminal state.
//!
//! ```text
//! AwaitingApproval ──approval(accounts)──▶ Approved ──sign response──▶ Done
//!        │                                     │
//!        └──── rejected / no accounts ─────────┴──▶ Rejected
//! ```
//!
//! Any fatal error moves the session to `Failed`; the shutdown signal moves
//! it to `Cancelled`.

use std::collections::HashMap;
use std::future::Future;

use tracing::{debug, info, trace, warn};

pub mod codec;
mod negotiate;
pub mod rpc;
pub mod uri;

pub use codec::{decode, InboundMessage, PendingKind};
pub use rpc::{PeerMeta, SessionApproval};
pub use uri::{SessionUri, UriError};

use crate::chain::TxId;
use crate::config::BridgeConfig;
use crate::crypto::{generate_key, generate_topic, Topic};
use crate::error::{Error, Result};
use crate::transport::{ConnectionState, RawEnvelope, Relay, Transport, WebSocketTransport};
use crate::workflow::{ResponseHandler, WorkflowError};

/// Where the session is in its lifecycle
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Session requested, waiting for the wallet
    AwaitingApproval,
    /// Wallet approved; a signing request is outstanding
    Approved {
        /// Wallet topic
        peer: Topic,
        /// Authorized accounts
        accounts: Vec<String>,
    },
    /// Wallet declined or ended the session
    Rejected {
        /// Reason given by the wallet, or why the approval was unusable
        reason: String,
    },
    /// Signed transactions were submitted
    Done {
        /// Ids of the submitted transactions
        tx_ids: Vec<TxId>,
    },
    /// A fatal error ended the session
    Failed,
    /// Stopped by the shutdown signal
    Cancelled,
}

impl SessionState {
    /// No further messages are processed
    pub fn is_terminal(&self) -> bool {
        !matches!(
            self,
            SessionState::AwaitingApproval | SessionState::Approved { .. }
        )
    }
}

/// How [`Session::run`] ended without an error
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Signed transactions were submitted
    Completed {
        /// Submitted transaction ids
        tx_ids: Vec<TxId>,
    },
    /// Wallet declined
    Rejected {
        /// Wallet's reason
        reason: String,
    },
    /// Shutdown signal fired
    Cancelled,
}

enum Event {
    Shutdown,
    Received(crate::transport::TransportResult<RawEnvelope>),
}

/// One wallet session
pub struct Session<T> {
    relay: Relay<T>,
    topic: Topic,
    bridge_url: String,
    state: SessionState,
    pending: HashMap<u64, PendingKind>,
}

impl Session<WebSocketTransport> {
    /// Generate key and topic, then dial the bridge. Single attempt.
    pub async fn connect(config: &BridgeConfig) -> Result<Self> {
        let key = generate_key().map_err(Error::Entropy)?;
        let topic = generate_topic().map_err(Error::Entropy)?;

        let url = config.socket_url();
        let transport = WebSocketTransport::connect_with_timeout(&url, config.connect_timeout)
            .await
            .map_err(|source| Error::Connect {
                url: url.clone(),
                source,
            })?;
        info!(%url, "connected to bridge");

        let relay = Relay::new(transport, key).with_receive_timeout(config.receive_timeout);
        Ok(Session::new(relay, topic, &config.bridge_url))
    }
}

impl<T: Transport> Session<T> {
    /// Generate key and topic and wrap an already connected transport
    pub fn with_transport(transport: T, config: &BridgeConfig) -> Result<Self> {
        let key = generate_key().map_err(Error::Entropy)?;
        let topic = generate_topic().map_err(Error::Entropy)?;

        let relay = Relay::new(transport, key).with_receive_timeout(config.receive_timeout);
        Ok(Session::new(relay, topic, &config.bridge_url))
    }

    fn new(relay: Relay<T>, topic: Topic, bridge_url: &str) -> Self {
        Session {
            relay,
            topic,
            bridge_url: bridge_url.to_string(),
            state: SessionState::AwaitingApproval,
            pending: HashMap::new(),
        }
    }

    /// Session topic, also our peer id
    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    /// Current lifecycle state
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Relay connection state
    pub fn connection_state(&self) -> ConnectionState {
        self.relay.state()
    }

    /// Requests still waiting for an answer
    pub fn pending_requests(&self) -> usize {
        self.pending.len()
    }

    /// Subscribe to the session topic
    pub async fn subscribe(&mut self) -> Result<()> {
        self.relay
            .subscribe(&self.topic)
            .await
            .map_err(Error::Transport)
    }

    /// Decrypt and decode one envelope
    pub fn decode_envelope(&self, envelope: &RawEnvelope) -> Result<InboundMessage> {
        let plaintext = self.relay.open(envelope).map_err(Error::Decrypt)?;
        Ok(decode(&plaintext, &self.pending))
    }

    /// Close the relay connection and wipe the session key
    pub async fn close(&mut self) {
        self.relay.close().await;
    }

    /// Drive the session until it completes, is rejected, fails or `shutdown` resolves
    ///
    /// Undecryptable envelopes and unknown messages are skipped. Every other
    /// error is fatal: the session moves to `Failed`, the relay is closed
    /// and the error is returned. Whatever the outcome, the session key is
    /// wiped before `run` returns.
    pub async fn run<H, F>(&mut self, handler: &mut H, shutdown: F) -> Result<SessionOutcome>
    where
        H: ResponseHandler + ?Sized,
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            if let Some(outcome) = self.outcome() {
                self.relay.close().await;
                return Ok(outcome);
            }

            let event = tokio::select! {
                biased;
                _ = &mut shutdown => Event::Shutdown,
                received = self.relay.receive() => Event::Received(received),
            };

            let envelope = match event {
                Event::Shutdown => return Ok(self.cancel().await),
                Event::Received(Ok(envelope)) => envelope,
                Event::Received(Err(e)) => return Err(self.fail(Error::Receive(e)).await),
            };

            let message = match self.decode_envelope(&envelope) {
                Ok(message) => message,
                Err(e) => {
                    debug!(topic = %envelope.topic, error = %e, "dropping envelope");
                    continue;
                }
            };

            let dispatched = tokio::select! {
                biased;
                _ = &mut shutdown => None,
                result = self.dispatch(message, handler) => Some(result),
            };

            match dispatched {
                None => return Ok(self.cancel().await),
                Some(Ok(())) => {}
                Some(Err(e)) => return Err(self.fail(e).await),
            }
        }
    }

    async fn dispatch<H>(&mut self, message: InboundMessage, handler: &mut H) -> Result<()>
    where
        H: ResponseHandler + ?Sized,
    {
        match message {
            InboundMessage::SessionApproval {
                request_id,
                approval,
            } => {
                self.pending.remove(&request_id);
                if self.state != SessionState::AwaitingApproval {
                    debug!(request_id, "ignoring approval outside the handshake");
                    return Ok(());
                }

                if !approval.is_usable() {
                    let reason = if approval.approved {
                        "wallet approved the session without accounts"
                    } else {
                        "wallet declined the session"
                    };
                    info!(reason, "session rejected");
                    self.state = SessionState::Rejected {
                        reason: reason.to_string(),
                    };
                    return Ok(());
                }

                let peer = approval.peer_id.clone().ok_or(WorkflowError::MissingPeerId)?;
                info!(%peer, accounts = approval.accounts.len(), "session approved");
                self.state = SessionState::Approved {
                    peer: peer.clone(),
                    accounts: approval.accounts.clone(),
                };

                let requests = handler.on_session_approval(&approval).await?;
                if requests.is_empty() {
                    return Err(WorkflowError::NothingToSign.into());
                }

                let id = self
                    .relay
                    .send_signing_request(&peer, &requests)
                    .await
                    .map_err(|source| WorkflowError::Send { peer, source })?;
                self.pending.insert(id, PendingKind::SignTransactions);
            }

            InboundMessage::SignResponse { request_id, signed } => {
                self.pending.remove(&request_id);
                if !matches!(self.state, SessionState::Approved { .. }) {
                    debug!(request_id, "ignoring signing response outside an approved session");
                    return Ok(());
                }

                info!(count = signed.len(), "signing response received");
                let tx_ids = handler.on_sign_response(&signed).await?;
                self.state = SessionState::Done { tx_ids };
            }

            InboundMessage::SessionUpdate(update) => {
                if update.approved {
                    debug!(accounts = update.accounts.len(), "session updated");
                } else if !self.state.is_terminal() {
                    info!("wallet ended the session");
                    self.state = SessionState::Rejected {
                        reason: "wallet ended the session".to_string(),
                    };
                }
            }

            InboundMessage::RequestRejected {
                request_id,
                kind,
                error,
            } => {
                self.pending.remove(&request_id);
                let applies = match kind {
                    PendingKind::SessionRequest => self.state == SessionState::AwaitingApproval,
                    PendingKind::SignTransactions => {
                        matches!(self.state, SessionState::Approved { .. })
                    }
                };

                if applies {
                    warn!(?kind, code = error.code, message = %error.message, "wallet rejected request");
                    self.state = SessionState::Rejected {
                        reason: error.message,
                    };
                } else {
                    debug!(request_id, ?kind, "ignoring stale rejection");
                }
            }

            InboundMessage::Unknown => {
                trace!("ignoring unrecognized message");
            }
        }

        Ok(())
    }

    fn outcome(&self) -> Option<SessionOutcome> {
        match &self.state {
            SessionState::Done { tx_ids } => Some(SessionOutcome::Completed {
                tx_ids: tx_ids.clone(),
            }),
            SessionState::Rejected { reason } => Some(SessionOutcome::Rejected {
                reason: reason.clone(),
            }),
            SessionState::Cancelled => Some(SessionOutcome::Cancelled),
            _ => None,
        }
    }

    async fn cancel(&mut self) -> SessionOutcome {
        info!("session cancelled");
        self.state = SessionState::Cancelled;
        self.relay.close().await;
        SessionOutcome::Cancelled
    }

    async fn fail(&mut self, error: Error) -> Error {
        warn!(error = %error, "session failed");
        self.state = SessionState::Failed;
        self.relay.close().await;
        error
    }
}
