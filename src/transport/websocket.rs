//! WebSocket transport for the bridge relay
//!
//! Each bridge frame is one JSON text message. Pings are answered inline and
//! never surface to the caller.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use super::{SocketMessage, Transport, TransportError, TransportResult};

/// Derive the socket URL from a bridge URL (`https` → `wss`, `http` → `ws`)
pub fn socket_url(bridge_url: &str) -> String {
    let trimmed = bridge_url.trim_end_matches('/');
    if let Some(rest) = trimmed.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = trimmed.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else if trimmed.starts_with("wss://") || trimmed.starts_with("ws://") {
        trimmed.to_string()
    } else {
        format!("wss://{}", trimmed)
    }
}

/// WebSocket transport connected to a bridge relay
pub struct WebSocketTransport {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    connected: bool,
}

impl WebSocketTransport {
    /// Connect to a relay server. Single attempt, no retry.
    pub async fn connect(url: &str) -> TransportResult<Self> {
        let (ws, _) = connect_async(url)
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        debug!(url, "relay socket open");

        Ok(WebSocketTransport {
            ws,
            connected: true,
        })
    }

    /// Connect, giving up after `timeout`
    pub async fn connect_with_timeout(url: &str, timeout: Duration) -> TransportResult<Self> {
        tokio::time::timeout(timeout, Self::connect(url))
            .await
            .map_err(|_| TransportError::Timeout(timeout))?
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send(&mut self, frame: &SocketMessage) -> TransportResult<()> {
        if !self.connected {
            return Err(TransportError::Disconnected);
        }

        let json =
            serde_json::to_string(frame).map_err(|e| TransportError::SendFailed(e.to_string()))?;

        self.ws
            .send(Message::Text(json))
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    async fn receive(&mut self) -> TransportResult<SocketMessage> {
        if !self.connected {
            return Err(TransportError::Disconnected);
        }

        loop {
            match self.ws.next().await {
                Some(Ok(Message::Text(text))) => match serde_json::from_str(&text) {
                    Ok(frame) => return Ok(frame),
                    Err(e) => {
                        warn!(error = %e, "ignoring malformed relay frame");
                        continue;
                    }
                },
                Some(Ok(Message::Close(_))) | None => {
                    self.connected = false;
                    return Err(TransportError::Disconnected);
                }
                Some(Ok(Message::Ping(data))) => {
                    let _ = self.ws.send(Message::Pong(data)).await;
                }
                Some(Err(e)) => {
                    self.connected = false;
                    return Err(TransportError::ReceiveFailed(e.to_string()));
                }
                _ => continue,
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn close(&mut self) -> TransportResult<()> {
        if !self.connected {
            return Ok(());
        }
        self.connected = false;
        self.ws
            .close(None)
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_url_derivation() {
        assert_eq!(
            socket_url("https://a.bridge.walletconnect.org"),
            "wss://a.bridge.walletconnect.org"
        );
        assert_eq!(socket_url("http://localhost:5001/"), "ws://localhost:5001");
        assert_eq!(socket_url("ws://localhost:5001"), "ws://localhost:5001");
        assert_eq!(
            socket_url("a.bridge.walletconnect.org"),
            "wss://a.bridge.walletconnect.org"
        );
    }

    #[tokio::test]
    async fn test_connect_refused() {
        // Nothing listens on port 1
        let result = WebSocketTransport::connect("ws://127.0.0.1:1").await;
        assert!(matches!(result, Err(TransportError::ConnectionFailed(_))));
    }
}
