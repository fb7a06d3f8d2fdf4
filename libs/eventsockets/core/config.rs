use crate::traits::*;
use std::fmt;

/// Configuration for a [`ConnectionManager`](crate::core::client::ConnectionManager)
///
/// Built directly or through [`ConnectionBuilder`](crate::core::builder::ConnectionBuilder).
pub struct ManagerConfig {
    /// Address to connect to (ws:// or wss://), including query parameters
    pub(crate) endpoint: String,

    /// Whether failures after a successful open trigger reconnection
    pub(crate) auto_reconnect: bool,

    /// Retry budget and backoff used by every connect cycle
    pub(crate) reconnect_strategy: Box<dyn ReconnectionStrategy>,

    /// Passed through to the transport factory on every attempt
    pub(crate) transport: TransportOptions,
}

impl ManagerConfig {
    /// Configuration with reconnection enabled and the default backoff
    /// (1s doubling up to 60s, unlimited retries)
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            auto_reconnect: true,
            reconnect_strategy: Box::new(ExponentialBackoff::default()),
            transport: TransportOptions::default(),
        }
    }

    pub fn with_auto_reconnect(mut self, enabled: bool) -> Self {
        self.auto_reconnect = enabled;
        self
    }

    pub fn with_reconnect_strategy(mut self, strategy: impl ReconnectionStrategy + 'static) -> Self {
        self.reconnect_strategy = Box::new(strategy);
        self
    }

    pub fn with_transport_options(mut self, options: TransportOptions) -> Self {
        self.transport = options;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn auto_reconnect(&self) -> bool {
        self.auto_reconnect
    }

    pub fn transport_options(&self) -> &TransportOptions {
        &self.transport
    }
}

impl fmt::Debug for ManagerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagerConfig")
            .field("endpoint", &crate::core::client::redact_endpoint(&self.endpoint))
            .field("auto_reconnect", &self.auto_reconnect)
            .field("transport", &self.transport)
            .finish_non_exhaustive()
    }
}
