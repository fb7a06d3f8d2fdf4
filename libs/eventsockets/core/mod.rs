//! # Connection core
//!
//! [`ConnectionManager`] keeps one logical connection alive over a
//! sequence of transports and fans its events out to subscribers.
//! [`MessageAdapter`] layers structured decoding on top.
//!
//! ## Example
//!
//! ```rust,ignore
//! use eventsockets::*;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let (manager, mut events) = eventsockets::builder()
//!         .endpoint("ws://localhost:8088/ari/events?app=demo")
//!         .reconnect_strategy(ExponentialBackoff::new(
//!             Duration::from_secs(1),
//!             Duration::from_secs(60),
//!             Some(10),
//!         ))
//!         .connect_subscribed()?;
//!
//!     while let Some(event) = events.recv().await {
//!         println!("Event: {:?}", event);
//!     }
//!
//!     manager.close();
//!     Ok(())
//! }
//! ```

pub mod adapter;
pub mod builder;
pub mod client;
pub mod config;
pub mod connection_state;
pub mod event;
pub mod registry;
pub mod ws_transport;

// Re-export main types
pub use adapter::{decode_event, DecodedSubscription, MessageAdapter};
pub use builder::{states, ConnectionBuilder};
pub use client::ConnectionManager;
pub use config::ManagerConfig;
pub use connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState, Metrics};
pub use event::{DisconnectDetails, DisconnectReason, Payload, SocketEvent};
pub use registry::{ListenerId, Subscription};
pub use ws_transport::{WsTransport, WsTransportFactory};

/// Create a new connection builder
pub fn builder() -> ConnectionBuilder<states::NoEndpoint> {
    ConnectionBuilder::new()
}
