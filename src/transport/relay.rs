//! Encrypted pub/sub over a [`Transport`]
//!
//! [`Relay`] is owned by the session for its whole lifetime. It holds the
//! session key, seals every outbound payload, tracks the connection state
//! and applies the receive timeout. Once the connection is `Failed` every
//! further call fails immediately; there is no reconnection. Closing the
//! relay wipes the key.

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, trace, warn};

use super::{ConnectionState, FrameKind, SocketMessage, Transport, TransportError, TransportResult};
use crate::crypto::{Cipher, CryptoError, CryptoResult, SessionKey, Topic};
use crate::session::rpc;
use crate::workflow::SigningRequest;

/// A publish frame as delivered by the relay, still encrypted
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawEnvelope {
    /// Topic the frame was delivered on
    pub topic: Topic,
    /// Sealed payload (`{"data","hmac","iv"}` JSON)
    pub payload: String,
}

/// Session-owned relay connection
pub struct Relay<T> {
    transport: T,
    key: Option<SessionKey>,
    state: ConnectionState,
    receive_timeout: Option<Duration>,
}

impl<T: Transport> Relay<T> {
    /// Wrap an established transport. The relay takes ownership of the key.
    pub fn new(transport: T, key: SessionKey) -> Self {
        let state = if transport.is_connected() {
            ConnectionState::Connected
        } else {
            ConnectionState::Closed
        };

        Relay {
            transport,
            key: Some(key),
            state,
            receive_timeout: None,
        }
    }

    /// Fail `receive` when nothing arrives for `timeout`
    pub fn with_receive_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.receive_timeout = timeout;
        self
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub(crate) fn key(&self) -> TransportResult<&SessionKey> {
        self.key
            .as_ref()
            .ok_or(TransportError::NotConnected { state: self.state })
    }

    fn ensure_open(&self) -> TransportResult<()> {
        if self.state.is_open() {
            Ok(())
        } else {
            Err(TransportError::NotConnected { state: self.state })
        }
    }

    /// Subscribe to a topic
    pub async fn subscribe(&mut self, topic: &Topic) -> TransportResult<()> {
        self.ensure_open()?;

        if let Err(e) = self.transport.send(&SocketMessage::subscribe(topic.as_str())).await {
            self.state = ConnectionState::Failed;
            return Err(e);
        }

        debug!(%topic, "subscribed");
        self.state = ConnectionState::Subscribed;
        Ok(())
    }

    /// Encrypt `message` as JSON and publish it to `topic`
    pub async fn send<M: Serialize + ?Sized>(
        &mut self,
        topic: &Topic,
        message: &M,
    ) -> TransportResult<()> {
        self.ensure_open()?;

        let plaintext =
            serde_json::to_vec(message).map_err(|e| TransportError::InvalidData(e.to_string()))?;
        let sealed = Cipher::seal(self.key()?, &plaintext);

        if let Err(e) = self
            .transport
            .send(&SocketMessage::publish(topic.as_str(), sealed))
            .await
        {
            self.state = ConnectionState::Failed;
            return Err(e);
        }

        trace!(%topic, bytes = plaintext.len(), "published");
        Ok(())
    }

    /// Ask the peer to sign `requests`. Returns the JSON-RPC id to correlate the response.
    pub async fn send_signing_request(
        &mut self,
        peer: &Topic,
        requests: &[SigningRequest],
    ) -> TransportResult<u64> {
        let request = rpc::sign_transactions(
            requests
                .iter()
                .map(SigningRequest::to_wallet_transaction)
                .collect(),
        );
        self.send(peer, &request).await?;

        debug!(%peer, id = request.id, count = requests.len(), "signing request sent");
        Ok(request.id)
    }

    /// Wait for the next publish frame
    ///
    /// Subscription and ack frames are skipped. On error or timeout the
    /// connection moves to `Failed`; on timeout it is also torn down.
    pub async fn receive(&mut self) -> TransportResult<RawEnvelope> {
        self.ensure_open()?;

        loop {
            let next = match self.receive_timeout {
                Some(limit) => match tokio::time::timeout(limit, self.transport.receive()).await {
                    Ok(result) => result,
                    Err(_) => {
                        warn!(timeout = ?limit, "relay went quiet, closing connection");
                        let _ = self.transport.close().await;
                        self.state = ConnectionState::Failed;
                        return Err(TransportError::Timeout(limit));
                    }
                },
                None => self.transport.receive().await,
            };

            match next {
                Ok(frame) if frame.kind == FrameKind::Pub => {
                    return Ok(RawEnvelope {
                        topic: Topic::from(frame.topic),
                        payload: frame.payload,
                    });
                }
                Ok(frame) => {
                    trace!(kind = ?frame.kind, topic = %frame.topic, "skipping non-publish frame");
                }
                Err(e) => {
                    self.state = ConnectionState::Failed;
                    return Err(e);
                }
            }
        }
    }

    /// Decrypt an envelope with the session key
    pub fn open(&self, envelope: &RawEnvelope) -> CryptoResult<Vec<u8>> {
        let key = self.key.as_ref().ok_or(CryptoError::KeyReleased)?;
        Cipher::open(key, &envelope.payload)
    }

    /// Close the connection and drop the key
    pub async fn close(&mut self) {
        self.key = None;
        if self.transport.is_connected() {
            if let Err(e) = self.transport.close().await {
                debug!(error = %e, "error while closing relay connection");
            }
        }
        if self.state != ConnectionState::Failed {
            self.state = ConnectionState::Closed;
        }
    }
}
