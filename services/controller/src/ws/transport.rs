//! Message-oriented transport to the puppeting service.
//!
//! The controller only needs "send one text frame" and "receive one text
//! frame", so the WebSocket sits behind a small trait. That keeps the
//! connection and dispatch logic testable against an in-memory script.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{self, protocol::Message as WsMessage},
};
use tracing::debug;

/// Failures of the underlying transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),
    #[error("connection closed by peer")]
    Closed,
    #[error("received a binary frame that is not valid UTF-8")]
    InvalidUtf8,
}

/// One open, half-duplex session.
#[async_trait]
pub trait Transport: Send {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError>;
    /// Waits for the next text frame, skipping control frames.
    async fn recv_text(&mut self) -> Result<String, TransportError>;
    /// Sends a close signal. Errors here are informational only.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Opens transports.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(&self, url: &str) -> Result<Box<dyn Transport>, TransportError>;
}

/// `Connector` for plain `ws://` URLs.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn open(&self, url: &str) -> Result<Box<dyn Transport>, TransportError> {
        let (stream, _) = connect_async(url).await?;
        debug!(%url, "WebSocket opened");
        Ok(Box::new(WsTransport { stream }))
    }
}

/// A tokio-tungstenite client stream.
pub struct WsTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Transport for WsTransport {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.stream.send(WsMessage::Text(text.into())).await?;
        Ok(())
    }

    async fn recv_text(&mut self) -> Result<String, TransportError> {
        loop {
            match self.stream.next().await {
                Some(Ok(WsMessage::Text(text))) => return Ok(text.to_string()),
                Some(Ok(WsMessage::Binary(data))) => {
                    return String::from_utf8(data.to_vec()).map_err(|_| TransportError::InvalidUtf8);
                }
                Some(Ok(WsMessage::Close(frame))) => {
                    debug!(?frame, "Peer closed the WebSocket");
                    return Err(TransportError::Closed);
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e.into()),
                None => return Err(TransportError::Closed),
            }
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        match self.stream.close(None).await {
            Ok(()) | Err(tungstenite::Error::ConnectionClosed) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
