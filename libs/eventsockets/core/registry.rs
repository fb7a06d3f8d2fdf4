//! Listener registry
//!
//! Every subscriber owns an unbounded channel; the registry keeps the
//! sending halves. Events are pushed to all listeners while holding one
//! lock, so every subscriber observes the same relative order. Closing
//! the registry delivers the final events, drops all senders and refuses
//! further emissions.

use crate::core::event::SocketEvent;
use futures::Stream;
use parking_lot::Mutex;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::trace;

/// Identifier of one subscription
pub type ListenerId = u64;

#[derive(Debug, Default)]
struct ListenerTable {
    next_id: ListenerId,
    listeners: Vec<(ListenerId, UnboundedSender<SocketEvent>)>,
    closed: bool,
}

#[derive(Debug, Default)]
pub(crate) struct ListenerRegistry {
    table: Mutex<ListenerTable>,
}

impl ListenerRegistry {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a new listener
    ///
    /// On a closed registry the returned subscription is already drained.
    pub(crate) fn attach(self: &Arc<Self>) -> Subscription {
        let (tx, rx) = unbounded_channel();
        let mut table = self.table.lock();
        let id = table.next_id;
        table.next_id += 1;

        if !table.closed {
            table.listeners.push((id, tx));
        }

        Subscription {
            id,
            rx,
            registry: Arc::downgrade(self),
        }
    }

    pub(crate) fn detach(&self, id: ListenerId) {
        self.table.lock().listeners.retain(|(listener, _)| *listener != id);
    }

    /// Deliver an event to every listener
    ///
    /// Returns `false` if the registry is closed and nothing was sent.
    pub(crate) fn emit(&self, event: SocketEvent) -> bool {
        let mut table = self.table.lock();
        if table.closed {
            return false;
        }

        trace!(event = event.name(), listeners = table.listeners.len(), "emitting event");
        table
            .listeners
            .retain(|(_, tx)| tx.send(event.clone()).is_ok());
        true
    }

    /// Emit the optional final error, then `Close`, then release every listener
    ///
    /// Only the first call has any effect; returns whether this call closed.
    pub(crate) fn close_with(&self, error: Option<SocketEvent>) -> bool {
        let mut table = self.table.lock();
        if table.closed {
            return false;
        }
        table.closed = true;

        for (_, tx) in table.listeners.drain(..) {
            if let Some(ref event) = error {
                let _ = tx.send(event.clone());
            }
            let _ = tx.send(SocketEvent::Close);
        }
        true
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.table.lock().closed
    }

    pub(crate) fn listener_count(&self) -> usize {
        self.table.lock().listeners.len()
    }
}

/// One caller's interest in a connection's events
///
/// Dropping the subscription detaches it. After `Close` has been
/// delivered, `recv` returns `None`.
#[derive(Debug)]
pub struct Subscription {
    id: ListenerId,
    rx: UnboundedReceiver<SocketEvent>,
    registry: Weak<ListenerRegistry>,
}

impl Subscription {
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Wait for the next event
    pub async fn recv(&mut self) -> Option<SocketEvent> {
        self.rx.recv().await
    }

    /// Take the next event if one is already queued
    pub fn try_recv(&mut self) -> Option<SocketEvent> {
        self.rx.try_recv().ok()
    }

    /// Detach from the connection
    pub fn unsubscribe(self) {}
}

impl Stream for Subscription {
    type Item = SocketEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.detach(self.id);
        }
    }
}
