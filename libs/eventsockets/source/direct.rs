use crate::core::adapter::{DecodedSubscription, MessageAdapter};
use crate::core::connection_state::{ConnectionState, Metrics};
use crate::source::params::ConnectParams;
use crate::traits::*;
use std::sync::Arc;
use tracing::info;

/// Event stream with one dedicated connection
///
/// The connection starts on construction and lives until
/// [`close`](Self::close) or drop. Callers subscribe and unsubscribe
/// freely without affecting it.
pub struct DirectSource {
    adapter: MessageAdapter,
}

impl DirectSource {
    /// Start the connection
    pub fn connect(params: &ConnectParams, factory: Arc<dyn TransportFactory>) -> Result<Self> {
        Self::connect_subscribed(params, factory).map(|(source, _)| source)
    }

    /// Start the connection with a subscription that sees it from the first event
    pub fn connect_subscribed(
        params: &ConnectParams,
        factory: Arc<dyn TransportFactory>,
    ) -> Result<(Self, DecodedSubscription)> {
        let config = params.manager_config()?;
        let (adapter, events) = MessageAdapter::connect_subscribed(config, factory)?;
        info!(apps = %params.apps.join(","), "direct event stream started");
        Ok((Self { adapter }, events))
    }

    pub fn subscribe(&self) -> DecodedSubscription {
        self.adapter.subscribe()
    }

    /// Tear down the connection; every subscriber receives `Close`
    pub fn close(&self) {
        self.adapter.close();
    }

    pub fn ping(&self, payload: impl Into<Vec<u8>>) -> Result<()> {
        self.adapter.ping(payload)
    }

    pub fn state(&self) -> ConnectionState {
        self.adapter.state()
    }

    pub fn metrics(&self) -> Metrics {
        self.adapter.metrics()
    }

    pub fn adapter(&self) -> &MessageAdapter {
        &self.adapter
    }
}
