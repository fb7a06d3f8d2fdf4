use crate::core::config::ManagerConfig;
use crate::source::address::{build_connection_url, Credentials};
use crate::traits::*;
use url::Url;

/// Retry budget applied by sources unless overridden
pub const DEFAULT_MAX_RETRIES: usize = 10;

/// Parameters for an event stream source
#[derive(Debug, Clone)]
pub struct ConnectParams {
    /// Base event endpoint, e.g. `ws://localhost:8088/ari/events`
    pub url: String,
    /// Applications to receive events for
    pub apps: Vec<String>,
    pub credentials: Credentials,
    /// Subscribe to all event sources, not only the applications' own
    pub subscribe_all: bool,
    /// Reconnect after an open connection is lost
    pub reconnect: bool,
    pub retry: RetrySettings,
    pub transport: TransportOptions,
}

impl ConnectParams {
    pub fn new<I, S>(url: impl Into<String>, apps: I, credentials: Credentials) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            url: url.into(),
            apps: apps.into_iter().map(Into::into).collect(),
            credentials,
            subscribe_all: true,
            reconnect: true,
            retry: RetrySettings {
                max_retries: Some(DEFAULT_MAX_RETRIES),
                ..RetrySettings::default()
            },
            transport: TransportOptions::default(),
        }
    }

    pub fn with_subscribe_all(mut self, subscribe_all: bool) -> Self {
        self.subscribe_all = subscribe_all;
        self
    }

    pub fn with_reconnect(mut self, reconnect: bool) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Retry budget per connect cycle (None = unlimited)
    pub fn with_max_retries(mut self, max_retries: Option<usize>) -> Self {
        self.retry.max_retries = max_retries;
        self
    }

    pub fn with_retry(mut self, retry: RetrySettings) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_transport(mut self, transport: TransportOptions) -> Self {
        self.transport = transport;
        self
    }

    /// The full address, credentials included
    pub fn connection_url(&self) -> Result<Url> {
        build_connection_url(&self.url, &self.apps, &self.credentials, self.subscribe_all)
    }

    /// Validate and translate into a manager configuration
    pub fn manager_config(&self) -> Result<ManagerConfig> {
        self.retry.validate()?;
        let url = self.connection_url()?;

        Ok(ManagerConfig::new(url.as_str())
            .with_auto_reconnect(self.reconnect)
            .with_reconnect_strategy(self.retry.to_strategy())
            .with_transport_options(self.transport.clone()))
    }
}
