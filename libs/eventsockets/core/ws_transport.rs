//! WebSocket transport backed by tokio-tungstenite

use crate::traits::*;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

/// Upper bound on the close handshake so teardown never hangs on a dead peer
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens tokio-tungstenite connections (ws:// and wss://)
#[derive(Debug, Clone, Copy, Default)]
pub struct WsTransportFactory;

#[async_trait]
impl TransportFactory for WsTransportFactory {
    async fn open(&self, url: &str, options: &TransportOptions) -> Result<Box<dyn Transport>> {
        let mut request = url
            .into_client_request()
            .map_err(|e| SocketError::InvalidUrl(e.to_string()))?;

        if let Some(ref provider) = options.headers {
            for (key, value) in provider.get_headers().await {
                match (
                    key.parse::<http::header::HeaderName>(),
                    value.parse::<http::header::HeaderValue>(),
                ) {
                    (Ok(name), Ok(value)) => {
                        request.headers_mut().insert(name, value);
                    }
                    (Err(_), _) => warn!("Invalid header name: {}", key),
                    (_, Err(_)) => warn!("Invalid header value for key '{}'", key),
                }
            }
        }

        let (stream, response) = connect_async(request)
            .await
            .map_err(|e| SocketError::Connect(e.to_string()))?;
        debug!(status = %response.status(), "WebSocket handshake complete");

        Ok(Box::new(WsTransport {
            stream,
            closed: false,
        }))
    }
}

/// One open WebSocket connection
pub struct WsTransport {
    stream: WsStream,
    closed: bool,
}

#[async_trait]
impl Transport for WsTransport {
    async fn next_signal(&mut self) -> Option<TransportSignal> {
        loop {
            let signal = match self.stream.next().await? {
                Ok(Message::Text(text)) => TransportSignal::Message(WsMessage::Text(text)),
                Ok(Message::Binary(data)) => TransportSignal::Message(WsMessage::Binary(data)),
                Ok(Message::Close(frame)) => {
                    let (code, reason) = frame
                        .map(|f| (Some(u16::from(f.code)), f.reason.into_owned()))
                        .unwrap_or((None, String::new()));
                    TransportSignal::Closed { code, reason }
                }
                // Pongs are queued by tungstenite itself
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => continue,
                Err(e) => TransportSignal::Error(SocketError::WebSocket(e.to_string())),
            };
            return Some(signal);
        }
    }

    async fn send(&mut self, message: WsMessage) -> Result<()> {
        let frame = match message {
            WsMessage::Text(text) => Message::Text(text),
            WsMessage::Binary(data) => Message::Binary(data),
        };
        self.stream
            .send(frame)
            .await
            .map_err(|e| SocketError::WebSocket(e.to_string()))
    }

    async fn ping(&mut self, payload: Vec<u8>) -> Result<()> {
        self.stream
            .send(Message::Ping(payload))
            .await
            .map_err(|e| SocketError::WebSocket(e.to_string()))
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        match tokio::time::timeout(CLOSE_TIMEOUT, self.stream.close(None)).await {
            Ok(Ok(())) => debug!("WebSocket closed"),
            Ok(Err(e)) => debug!("WebSocket close returned: {}", e),
            Err(_) => debug!("WebSocket close timed out"),
        }
    }
}
