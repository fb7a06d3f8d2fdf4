//! # EventSockets Traits
//!
//! Seams of the connector, each with a default implementation:
//!
//! - **TransportFactory / Transport**: open and drive a duplex socket
//! - **ReconnectionStrategy**: retry budget and backoff delays
//! - **HeaderProvider**: handshake headers, regenerated per attempt
//! - **MessageDecoder**: best-effort structured decoding of text frames

pub mod decoder;
pub mod error;
pub mod headers;
pub mod reconnect;
pub mod transport;

// Re-export commonly used types
pub use decoder::{JsonDecoder, MessageDecoder};
pub use error::{Result, SocketError};
pub use headers::{HeaderProvider, Headers, StaticHeaders};
pub use reconnect::{ExponentialBackoff, FixedDelay, ReconnectionStrategy, RetrySettings};
pub use transport::{Transport, TransportFactory, TransportOptions, TransportSignal, WsMessage};
