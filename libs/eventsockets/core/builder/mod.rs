pub mod states;

use crate::core::adapter::{DecodedSubscription, MessageAdapter};
use crate::core::client::ConnectionManager;
use crate::core::config::ManagerConfig;
use crate::core::registry::Subscription;
use crate::core::ws_transport::WsTransportFactory;
use crate::traits::*;
use states::*;
use std::sync::Arc;
use std::time::Duration;

/// Type-state builder for [`ConnectionManager`]
///
/// The endpoint must be set before `connect` becomes available.
/// Everything else has a default: auto-reconnect on, exponential
/// backoff without a retry limit, and the tokio-tungstenite transport.
pub struct ConnectionBuilder<E>
where
    E: EndpointState,
{
    _state: TypeState<E>,
    endpoint: Option<String>,
    auto_reconnect: bool,
    reconnect_strategy: Option<Box<dyn ReconnectionStrategy>>,
    headers: Option<Arc<dyn HeaderProvider>>,
    connect_timeout: Option<Duration>,
    factory: Option<Arc<dyn TransportFactory>>,
}

impl ConnectionBuilder<NoEndpoint> {
    /// Create a new builder instance
    pub fn new() -> Self {
        Self {
            _state: TypeState::new(),
            endpoint: None,
            auto_reconnect: true,
            reconnect_strategy: None,
            headers: None,
            connect_timeout: None,
            factory: None,
        }
    }

    pub fn endpoint(self, endpoint: impl Into<String>) -> ConnectionBuilder<HasEndpoint> {
        ConnectionBuilder {
            _state: TypeState::new(),
            endpoint: Some(endpoint.into()),
            auto_reconnect: self.auto_reconnect,
            reconnect_strategy: self.reconnect_strategy,
            headers: self.headers,
            connect_timeout: self.connect_timeout,
            factory: self.factory,
        }
    }
}

impl Default for ConnectionBuilder<NoEndpoint> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> ConnectionBuilder<E>
where
    E: EndpointState,
{
    /// Reconnect after an open connection is lost (default: true)
    pub fn auto_reconnect(mut self, enabled: bool) -> Self {
        self.auto_reconnect = enabled;
        self
    }

    /// Set the retry budget and backoff
    pub fn reconnect_strategy<S>(mut self, strategy: S) -> Self
    where
        S: ReconnectionStrategy + 'static,
    {
        self.reconnect_strategy = Some(Box::new(strategy));
        self
    }

    /// Set a provider for handshake headers
    pub fn headers<H>(mut self, provider: H) -> Self
    where
        H: HeaderProvider + 'static,
    {
        self.headers = Some(Arc::new(provider));
        self
    }

    /// Bound the duration of a single connect attempt
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Replace the default WebSocket transport
    pub fn transport_factory<F>(mut self, factory: F) -> Self
    where
        F: TransportFactory,
    {
        self.factory = Some(Arc::new(factory));
        self
    }

    /// Replace the default WebSocket transport with a shared factory
    pub fn shared_transport_factory(mut self, factory: Arc<dyn TransportFactory>) -> Self {
        self.factory = Some(factory);
        self
    }
}

impl ConnectionBuilder<HasEndpoint> {
    /// Split into the manager configuration and the transport factory
    pub fn into_parts(self) -> (ManagerConfig, Arc<dyn TransportFactory>) {
        let transport = TransportOptions {
            headers: self.headers,
            connect_timeout: self.connect_timeout,
        };

        let mut config = ManagerConfig::new(self.endpoint.unwrap_or_default())
            .with_auto_reconnect(self.auto_reconnect)
            .with_transport_options(transport);
        if let Some(strategy) = self.reconnect_strategy {
            config.reconnect_strategy = strategy;
        }

        let factory = self
            .factory
            .unwrap_or_else(|| Arc::new(WsTransportFactory) as Arc<dyn TransportFactory>);

        (config, factory)
    }

    /// Build the manager and begin connecting
    pub fn connect(self) -> Result<ConnectionManager> {
        let (config, factory) = self.into_parts();
        ConnectionManager::connect(config, factory)
    }

    /// Build the manager with a subscription attached before the first attempt
    pub fn connect_subscribed(self) -> Result<(ConnectionManager, Subscription)> {
        let (config, factory) = self.into_parts();
        ConnectionManager::connect_subscribed(config, factory)
    }

    /// Build a decoding adapter over a new manager
    pub fn connect_decoded(self) -> Result<(MessageAdapter, DecodedSubscription)> {
        let (config, factory) = self.into_parts();
        MessageAdapter::connect_subscribed(config, factory)
    }
}
