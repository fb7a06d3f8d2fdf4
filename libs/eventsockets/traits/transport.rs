//! Transport seam
//!
//! The connection manager never talks to a socket directly. It asks a
//! [`TransportFactory`] for a fresh [`Transport`] on every connect
//! attempt and reads [`TransportSignal`]s from it until it fails. The
//! production factory is [`crate::core::ws_transport::WsTransportFactory`];
//! tests plug in scripted factories.

use crate::traits::error::Result;
use crate::traits::headers::HeaderProvider;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Raw frame exchanged with the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WsMessage {
    Text(String),
    Binary(Vec<u8>),
}

impl WsMessage {
    /// Get the message as text, if it is text
    pub fn as_text(&self) -> Option<&str> {
        match self {
            WsMessage::Text(s) => Some(s),
            WsMessage::Binary(_) => None,
        }
    }

    /// Get the message as binary, if it is binary
    pub fn as_binary(&self) -> Option<&[u8]> {
        match self {
            WsMessage::Text(_) => None,
            WsMessage::Binary(b) => Some(b),
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, WsMessage::Text(_))
    }
}

/// Signal raised by an open transport
#[derive(Debug, Clone, PartialEq)]
pub enum TransportSignal {
    /// Data frame received
    Message(WsMessage),
    /// Protocol or I/O failure; the transport is unusable afterwards
    Error(crate::traits::error::SocketError),
    /// The remote side closed the connection
    Closed { code: Option<u16>, reason: String },
}

/// An open duplex connection
///
/// `next_signal` must be cancel-safe: the connection manager polls it
/// inside `tokio::select!` together with its command and shutdown
/// branches.
#[async_trait]
pub trait Transport: Send {
    /// Wait for the next signal. `None` means the stream ended without
    /// a close frame and is treated like an abrupt close.
    async fn next_signal(&mut self) -> Option<TransportSignal>;

    /// Send a data frame
    async fn send(&mut self, message: WsMessage) -> Result<()>;

    /// Send a liveness probe
    async fn ping(&mut self, payload: Vec<u8>) -> Result<()>;

    /// Request the underlying connection to close
    async fn close(&mut self);
}

/// Creates transports, one per connect attempt
#[async_trait]
pub trait TransportFactory: Send + Sync + 'static {
    /// Open a transport to `url`. Resolves once the transport is open or
    /// the attempt has failed.
    async fn open(&self, url: &str, options: &TransportOptions) -> Result<Box<dyn Transport>>;
}

/// Options passed through to the transport on every connect attempt
#[derive(Clone, Default)]
pub struct TransportOptions {
    /// Optional provider of handshake headers
    pub headers: Option<Arc<dyn HeaderProvider>>,
    /// Upper bound for a single connect attempt
    pub connect_timeout: Option<Duration>,
}

impl TransportOptions {
    pub fn with_headers(mut self, headers: Arc<dyn HeaderProvider>) -> Self {
        self.headers = Some(headers);
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }
}

impl fmt::Debug for TransportOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportOptions")
            .field("headers", &self.headers.is_some())
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}
