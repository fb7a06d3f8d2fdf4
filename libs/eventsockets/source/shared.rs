//! Reference-counted shared event stream
//!
//! The first subscriber starts the connection, the last one to leave
//! tears it down. Every subscriber in between receives the same events
//! in the same order. A connection that closes on its own (retries
//! exhausted, reconnect disabled) ends its generation: the next
//! subscriber starts a fresh one and handles from the dead generation no
//! longer count.

use crate::core::adapter::{DecodedSubscription, MessageAdapter};
use crate::core::connection_state::{ConnectionState, Metrics};
use crate::core::event::SocketEvent;
use crate::core::registry::ListenerId;
use crate::source::params::ConnectParams;
use crate::traits::*;
use futures::Stream;
use parking_lot::Mutex;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tracing::{debug, info};

#[derive(Default)]
struct SharedSlot {
    generation: u64,
    subscribers: usize,
    adapter: Option<MessageAdapter>,
}

struct SharedInner {
    params: ConnectParams,
    factory: Arc<dyn TransportFactory>,
    slot: Mutex<SharedSlot>,
}

impl SharedInner {
    fn release(&self, generation: u64) {
        let adapter = {
            let mut slot = self.slot.lock();
            if slot.generation != generation || slot.subscribers == 0 {
                return;
            }
            slot.subscribers -= 1;
            if slot.subscribers > 0 {
                return;
            }
            slot.adapter.take()
        };

        if let Some(adapter) = adapter {
            info!(generation, "last subscriber left, closing shared event stream");
            adapter.close();
        }
    }
}

/// Lazily started, reference-counted event stream
///
/// Cloning the source shares the same connection slot.
#[derive(Clone)]
pub struct SharedSource {
    inner: Arc<SharedInner>,
}

impl SharedSource {
    /// Create the source; nothing connects until the first subscriber
    ///
    /// The parameters are validated here so a bad address fails early.
    pub fn new(params: ConnectParams, factory: Arc<dyn TransportFactory>) -> Result<Self> {
        params.manager_config()?;
        Ok(Self {
            inner: Arc::new(SharedInner {
                params,
                factory,
                slot: Mutex::new(SharedSlot::default()),
            }),
        })
    }

    /// Join the shared stream, starting a connection if none is live
    pub fn subscribe(&self) -> Result<SharedSubscription> {
        let mut slot = self.inner.slot.lock();

        let live = slot.adapter.as_ref().filter(|adapter| !adapter.is_closed());
        let events = match live {
            Some(adapter) => adapter.subscribe(),
            None => {
                if slot.adapter.take().is_some() {
                    debug!(generation = slot.generation, "shared connection closed on its own");
                }
                let config = self.inner.params.manager_config()?;
                let (adapter, events) =
                    MessageAdapter::connect_subscribed(config, Arc::clone(&self.inner.factory))?;

                slot.generation += 1;
                slot.subscribers = 0;
                slot.adapter = Some(adapter);
                info!(generation = slot.generation, "first subscriber joined, starting shared event stream");
                events
            }
        };
        slot.subscribers += 1;

        Ok(SharedSubscription {
            events,
            generation: slot.generation,
            source: Arc::clone(&self.inner),
        })
    }

    /// Subscribers counted against the live generation
    pub fn subscriber_count(&self) -> usize {
        self.inner.slot.lock().subscribers
    }

    /// Whether a connection is currently held (it may be reconnecting)
    pub fn is_active(&self) -> bool {
        self.inner
            .slot
            .lock()
            .adapter
            .as_ref()
            .map_or(false, |adapter| !adapter.is_closed())
    }

    pub fn state(&self) -> Option<ConnectionState> {
        self.inner.slot.lock().adapter.as_ref().map(MessageAdapter::state)
    }

    pub fn metrics(&self) -> Option<Metrics> {
        self.inner.slot.lock().adapter.as_ref().map(MessageAdapter::metrics)
    }

    /// Close the live connection regardless of subscribers
    ///
    /// Every subscriber receives `Close`; their handles stop counting.
    pub fn close(&self) {
        let adapter = {
            let mut slot = self.inner.slot.lock();
            slot.generation += 1;
            slot.subscribers = 0;
            slot.adapter.take()
        };

        if let Some(adapter) = adapter {
            info!("closing shared event stream");
            adapter.close();
        }
    }
}

/// A subscriber's handle on a [`SharedSource`]
///
/// Can receive events and leave; it cannot close the shared connection.
/// Dropping the handle leaves.
pub struct SharedSubscription {
    events: DecodedSubscription,
    generation: u64,
    source: Arc<SharedInner>,
}

impl SharedSubscription {
    pub fn id(&self) -> ListenerId {
        self.events.id()
    }

    pub async fn recv(&mut self) -> Option<SocketEvent> {
        self.events.recv().await
    }

    pub fn try_recv(&mut self) -> Option<SocketEvent> {
        self.events.try_recv()
    }

    /// Leave the shared stream
    pub fn unsubscribe(self) {}
}

impl Stream for SharedSubscription {
    type Item = SocketEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.events).poll_next(cx)
    }
}

impl Drop for SharedSubscription {
    fn drop(&mut self) {
        self.source.release(self.generation);
    }
}
