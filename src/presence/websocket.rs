//! Presence WebSocket connection and frame handling

use anyhow::{Context, Result};
use futures::{SinkExt, StreamExt};
use tokio_tungstenite::{connect_async, tungstenite::Message};

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

pub struct PresenceSocket {
    stream: WsStream,
}

impl PresenceSocket {
    /// Connect to the Socket.IO WebSocket endpoint.
    ///
    /// Auth is not part of the upgrade; it travels in the namespace
    /// connect packet once the Engine.IO handshake arrives.
    pub async fn connect(ws_url: &str) -> Result<Self> {
        tracing::info!("Connecting presence WebSocket to {}", ws_url);

        let (stream, response) = connect_async(ws_url)
            .await
            .context("WebSocket connection failed")?;

        tracing::info!("WebSocket connected (status={})", response.status());

        Ok(Self { stream })
    }

    /// Send a text frame.
    pub async fn send_text(&mut self, msg: &str) -> Result<()> {
        // Namespace connect carries the token; keep it out of the log.
        if msg.starts_with("40") {
            tracing::debug!("WS send: 40{{<auth>}}");
        } else {
            tracing::debug!("WS send: {}", msg);
        }
        self.stream
            .send(Message::Text(msg.to_string()))
            .await
            .context("Failed to send WebSocket message")
    }

    /// Receive the next text frame, answering WebSocket-level pings.
    ///
    /// Returns `None` once the server closes the connection.
    pub async fn recv_frame(&mut self) -> Result<Option<String>> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    tracing::debug!("WS recv: {}", text);
                    return Ok(Some(text));
                }
                Some(Ok(Message::Ping(data))) => {
                    self.stream
                        .send(Message::Pong(data))
                        .await
                        .context("Failed to send pong")?;
                }
                Some(Ok(Message::Close(frame))) => {
                    tracing::info!("WebSocket closed: {:?}", frame);
                    return Ok(None);
                }
                Some(Ok(other)) => {
                    tracing::debug!("WS frame (ignored): {:?}", other);
                }
                Some(Err(e)) => {
                    return Err(e).context("WebSocket receive error");
                }
                None => {
                    return Ok(None);
                }
            }
        }
    }

    /// Close the connection politely; errors are irrelevant at this point.
    pub async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            tracing::debug!("WebSocket close failed: {}", e);
        }
    }
}
