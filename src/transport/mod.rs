//! Relay transport
//!
//! This module provides the connection to the bridge relay:
//! - `Transport`: moves pub/sub frames over some connection
//! - `websocket`: the real relay connection
//! - `memory`: an in-process relay for tests
//! - `relay`: session-owned wrapper adding encryption, state and timeouts
//!
//! # Design
//!
//! A `Transport` only frames and moves [`SocketMessage`]s. It knows nothing
//! about keys or JSON-RPC; encryption happens in [`Relay`].

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod relay;
pub mod websocket;

pub use relay::{RawEnvelope, Relay};
pub use websocket::WebSocketTransport;

/// Transport errors
#[derive(Error, Debug)]
pub enum TransportError {
    /// Connection failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Connection closed by the relay
    #[error("Connection closed")]
    Disconnected,

    /// Operation attempted in a state that does not allow it
    #[error("Relay connection is {state}")]
    NotConnected {
        /// State the connection was in
        state: ConnectionState,
    },

    /// Send failed
    #[error("Failed to send: {0}")]
    SendFailed(String),

    /// Receive failed
    #[error("Failed to receive: {0}")]
    ReceiveFailed(String),

    /// Nothing arrived within the receive timeout
    #[error("Timed out after {0:?} waiting for the relay")]
    Timeout(Duration),

    /// Invalid data
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl TransportError {
    /// Check if this error was caused by a timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout(_))
    }
}

/// Result type for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

/// Lifecycle of a relay connection
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    /// Handshake in progress
    Connecting,
    /// Open, no subscription yet
    Connected,
    /// Open and subscribed to at least one topic
    Subscribed,
    /// Unrecoverable I/O error or timeout
    Failed,
    /// Closed locally
    Closed,
}

impl ConnectionState {
    /// Whether publish/subscribe are allowed
    pub fn is_open(self) -> bool {
        matches!(self, ConnectionState::Connected | ConnectionState::Subscribed)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Subscribed => "subscribed",
            ConnectionState::Failed => "failed",
            ConnectionState::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Frame kind on the bridge socket
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameKind {
    /// Publish a payload to a topic
    Pub,
    /// Subscribe to a topic
    Sub,
    /// Acknowledge a delivered payload
    Ack,
}

/// One frame exchanged with the bridge
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocketMessage {
    /// Routing topic
    pub topic: String,
    /// Frame kind
    #[serde(rename = "type")]
    pub kind: FrameKind,
    /// Encrypted payload as a JSON string, empty for subscriptions
    #[serde(default)]
    pub payload: String,
    /// Suppress push notifications on the wallet side
    #[serde(default)]
    pub silent: bool,
}

impl SocketMessage {
    /// Publish frame
    pub fn publish(topic: impl Into<String>, payload: impl Into<String>) -> Self {
        SocketMessage {
            topic: topic.into(),
            kind: FrameKind::Pub,
            payload: payload.into(),
            silent: true,
        }
    }

    /// Subscribe frame
    pub fn subscribe(topic: impl Into<String>) -> Self {
        SocketMessage {
            topic: topic.into(),
            kind: FrameKind::Sub,
            payload: String::new(),
            silent: true,
        }
    }
}

/// Abstract transport trait
///
/// All transports must implement this trait. The transport is responsible
/// only for moving frames - encryption is handled at a higher layer.
#[async_trait]
pub trait Transport: Send {
    /// Send a frame to the relay
    async fn send(&mut self, frame: &SocketMessage) -> TransportResult<()>;

    /// Receive the next frame from the relay
    ///
    /// Blocks until a frame is available or the connection is closed.
    async fn receive(&mut self) -> TransportResult<SocketMessage>;

    /// Check if the transport is connected
    fn is_connected(&self) -> bool;

    /// Close the transport
    async fn close(&mut self) -> TransportResult<()>;
}

/// In-memory relay for testing
///
/// [`create_pair`](memory::create_pair) returns the client-side transport and
/// a [`MemoryRelay`](memory::MemoryRelay) handle that plays the bridge: it
/// sees every frame the client sends and can deliver frames back.
pub mod memory {
    use super::*;
    use tokio::sync::mpsc;

    /// Create a connected client transport and its relay handle
    pub fn create_pair() -> (MemoryTransport, MemoryRelay) {
        let (to_relay, from_client) = mpsc::unbounded_channel();
        let (to_client, from_relay) = mpsc::unbounded_channel();

        let transport = MemoryTransport {
            tx: to_relay,
            rx: from_relay,
            connected: true,
        };

        let relay = MemoryRelay {
            tx: Some(to_client),
            rx: from_client,
        };

        (transport, relay)
    }

    /// Client endpoint
    pub struct MemoryTransport {
        tx: mpsc::UnboundedSender<SocketMessage>,
        rx: mpsc::UnboundedReceiver<SocketMessage>,
        connected: bool,
    }

    #[async_trait]
    impl Transport for MemoryTransport {
        async fn send(&mut self, frame: &SocketMessage) -> TransportResult<()> {
            if !self.connected {
                return Err(TransportError::Disconnected);
            }

            self.tx
                .send(frame.clone())
                .map_err(|_| TransportError::SendFailed("Channel closed".to_string()))
        }

        async fn receive(&mut self) -> TransportResult<SocketMessage> {
            if !self.connected {
                return Err(TransportError::Disconnected);
            }

            match self.rx.recv().await {
                Some(frame) => Ok(frame),
                None => {
                    self.connected = false;
                    Err(TransportError::Disconnected)
                }
            }
        }

        fn is_connected(&self) -> bool {
            self.connected
        }

        async fn close(&mut self) -> TransportResult<()> {
            self.connected = false;
            self.rx.close();
            Ok(())
        }
    }

    /// Relay side of an in-memory pair
    pub struct MemoryRelay {
        tx: Option<mpsc::UnboundedSender<SocketMessage>>,
        rx: mpsc::UnboundedReceiver<SocketMessage>,
    }

    impl MemoryRelay {
        /// Deliver a frame to the client
        pub fn deliver(&self, frame: SocketMessage) -> TransportResult<()> {
            self.tx
                .as_ref()
                .ok_or(TransportError::Disconnected)?
                .send(frame)
                .map_err(|_| TransportError::Disconnected)
        }

        /// Wait for the next frame the client sent
        pub async fn next_sent(&mut self) -> Option<SocketMessage> {
            self.rx.recv().await
        }

        /// Drain every frame the client has sent so far
        pub fn drain_sent(&mut self) -> Vec<SocketMessage> {
            let mut frames = Vec::new();
            while let Ok(frame) = self.rx.try_recv() {
                frames.push(frame);
            }
            frames
        }

        /// Drop the connection; the client's next receive fails
        pub fn disconnect(&mut self) {
            self.tx = None;
        }
    }
}
