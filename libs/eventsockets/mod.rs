//! # EventSockets
//!
//! A resilient event stream connector over WebSocket.
//!
//! ## Features
//!
//! - **Reconnecting manager**: bounded exponential backoff, lifecycle
//!   events (`Open`, `Disconnected`, `Reconnected`, `Error`, `Close`)
//! - **Type-state builder**: the endpoint is required at compile time
//! - **Decoding adapter**: text frames decoded as JSON, raw text otherwise
//! - **Shared sources**: one connection per group of subscribers, started
//!   on the first and torn down after the last
//! - **Pluggable seams**: transport, reconnection strategy, handshake
//!   headers and message decoding

pub mod traits;
pub mod core;
pub mod source;

// Re-export all traits
pub use traits::*;

// Re-export core functionality
pub use self::core::{
    adapter, builder, client, config, connection_state, event, registry, ws_transport,
    adapter::{decode_event, DecodedSubscription, MessageAdapter},
    builder::{states, ConnectionBuilder},
    client::ConnectionManager,
    config::ManagerConfig,
    connection_state::{ConnectionState, Metrics},
    event::{DisconnectDetails, DisconnectReason, Payload, SocketEvent},
    registry::{ListenerId, Subscription},
    ws_transport::WsTransportFactory,
};

// Re-export sources
pub use source::{
    build_connection_url, ConnectParams, Credentials, DirectSource, SharedSource,
    SharedSubscription, DEFAULT_MAX_RETRIES,
};

/// Type alias for Result with SocketError
pub type Result<T> = std::result::Result<T, traits::SocketError>;
