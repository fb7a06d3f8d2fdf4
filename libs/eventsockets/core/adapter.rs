//! Decoding adapter
//!
//! Wraps a [`ConnectionManager`] and turns non-empty text frames into
//! structured data. Frames that fail to decode, empty text and binary
//! frames pass through unchanged. Lifecycle events and operations are
//! forwarded as-is.

use crate::core::client::ConnectionManager;
use crate::core::config::ManagerConfig;
use crate::core::connection_state::{ConnectionState, Metrics};
use crate::core::event::{Payload, SocketEvent};
use crate::core::registry::{ListenerId, Subscription};
use crate::traits::*;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// Apply a decoder to one event
pub fn decode_event<D>(decoder: &D, event: SocketEvent) -> SocketEvent
where
    D: MessageDecoder + ?Sized,
{
    match event {
        SocketEvent::Message(Payload::Text(text)) if !text.is_empty() => match decoder.decode(&text) {
            Some(value) => SocketEvent::Message(Payload::Json(value)),
            None => SocketEvent::Message(Payload::Text(text)),
        },
        other => other,
    }
}

/// A connection manager whose subscribers receive decoded messages
pub struct MessageAdapter<D = JsonDecoder>
where
    D: MessageDecoder,
{
    inner: ConnectionManager,
    decoder: Arc<D>,
}

impl MessageAdapter<JsonDecoder> {
    pub fn new(inner: ConnectionManager) -> Self {
        Self::with_decoder(inner, JsonDecoder)
    }

    /// Create a manager and wrap it, with a decoded subscription attached
    /// before the first connect attempt
    pub fn connect_subscribed(
        config: ManagerConfig,
        factory: Arc<dyn TransportFactory>,
    ) -> Result<(Self, DecodedSubscription<JsonDecoder>)> {
        let (manager, events) = ConnectionManager::connect_subscribed(config, factory)?;
        let adapter = Self::new(manager);
        let events = adapter.wrap(events);
        Ok((adapter, events))
    }
}

impl<D> MessageAdapter<D>
where
    D: MessageDecoder,
{
    pub fn with_decoder(inner: ConnectionManager, decoder: D) -> Self {
        Self {
            inner,
            decoder: Arc::new(decoder),
        }
    }

    /// Attach a listener that receives decoded messages
    pub fn subscribe(&self) -> DecodedSubscription<D> {
        self.wrap(self.inner.subscribe())
    }

    fn wrap(&self, events: Subscription) -> DecodedSubscription<D> {
        DecodedSubscription {
            inner: events,
            decoder: Arc::clone(&self.decoder),
        }
    }

    pub fn close(&self) {
        self.inner.close();
    }

    pub fn ping(&self, payload: impl Into<Vec<u8>>) -> Result<()> {
        self.inner.ping(payload)
    }

    pub fn send(&self, message: WsMessage) -> Result<()> {
        self.inner.send(message)
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.state()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    pub fn metrics(&self) -> Metrics {
        self.inner.metrics()
    }

    /// The wrapped manager
    pub fn manager(&self) -> &ConnectionManager {
        &self.inner
    }

    /// Close and wait for the transport to be released
    pub async fn shutdown(self) {
        self.inner.shutdown().await;
    }
}

/// Subscription that decodes text frames on the way out
#[derive(Debug)]
pub struct DecodedSubscription<D = JsonDecoder> {
    inner: Subscription,
    decoder: Arc<D>,
}

impl<D> DecodedSubscription<D>
where
    D: MessageDecoder,
{
    pub fn id(&self) -> ListenerId {
        self.inner.id()
    }

    pub async fn recv(&mut self) -> Option<SocketEvent> {
        let event = self.inner.recv().await?;
        Some(decode_event(self.decoder.as_ref(), event))
    }

    pub fn try_recv(&mut self) -> Option<SocketEvent> {
        let event = self.inner.try_recv()?;
        Some(decode_event(self.decoder.as_ref(), event))
    }

    /// Detach from the connection
    pub fn unsubscribe(self) {}
}

impl<D> Stream for DecodedSubscription<D>
where
    D: MessageDecoder,
{
    type Item = SocketEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        Pin::new(&mut this.inner)
            .poll_next(cx)
            .map(|event| event.map(|event| decode_event(this.decoder.as_ref(), event)))
    }
}
