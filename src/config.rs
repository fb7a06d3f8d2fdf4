//! Event stream configuration
//!
//! Loaded from YAML. Credentials and the endpoint can be overridden from
//! the environment (`.env` is read first), so secrets need not live in
//! the file.

use eventsockets::{ConnectParams, Credentials, RetrySettings, TransportOptions, DEFAULT_MAX_RETRIES};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

pub const ENV_USERNAME: &str = "ARI_USERNAME";
pub const ENV_PASSWORD: &str = "ARI_PASSWORD";
pub const ENV_URL: &str = "ARI_URL";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config file: {0}")]
    FileError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Event stream tailer configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    /// Event endpoint, e.g. ws://localhost:8088/ari/events
    pub url: String,
    /// Applications to receive events for
    pub apps: Vec<String>,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_true")]
    pub subscribe_all: bool,
    /// Reconnect after an open connection is lost
    #[serde(default = "default_true")]
    pub reconnect: bool,
    #[serde(default = "default_retry")]
    pub retry: RetrySettings,
    /// Upper bound for one connect attempt
    #[serde(default)]
    pub connect_timeout_ms: Option<u64>,
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Seconds without events before a heartbeat line is logged
    #[serde(default = "default_heartbeat")]
    pub heartbeat_secs: u64,
}

impl fmt::Debug for EventsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventsConfig")
            .field("url", &self.url)
            .field("apps", &self.apps)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("subscribe_all", &self.subscribe_all)
            .field("reconnect", &self.reconnect)
            .field("retry", &self.retry)
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .field("log_level", &self.log_level)
            .field("heartbeat_secs", &self.heartbeat_secs)
            .finish()
    }
}

fn default_true() -> bool {
    true
}

fn default_retry() -> RetrySettings {
    RetrySettings {
        max_retries: Some(DEFAULT_MAX_RETRIES),
        ..RetrySettings::default()
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_heartbeat() -> u64 {
    300
}

impl EventsConfig {
    /// Load configuration from a YAML file, then apply environment overrides
    pub fn load(config_path: impl AsRef<Path>) -> Result<Self> {
        let yaml_content = std::fs::read_to_string(config_path)?;
        let mut config: EventsConfig = serde_yaml::from_str(&yaml_content)?;

        // Don't fail if .env doesn't exist
        dotenv::dotenv().ok();
        config.apply_overrides(|key| std::env::var(key).ok());

        config.validate()?;
        Ok(config)
    }

    /// Parse and validate without consulting the environment
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: EventsConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Replace url and credentials with values found by `lookup`
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_URL) {
            info!("Overriding event endpoint from environment variable");
            self.url = url;
        }
        if let Some(username) = lookup(ENV_USERNAME) {
            self.username = username;
        }
        if let Some(password) = lookup(ENV_PASSWORD) {
            self.password = password;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(ConfigError::ValidationError("url cannot be empty".to_string()));
        }
        if self.apps.iter().all(|app| app.trim().is_empty()) {
            return Err(ConfigError::ValidationError(
                "at least one application name is required".to_string(),
            ));
        }
        self.retry
            .validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "log_level must be one of: {}",
                valid_levels.join(", ")
            )));
        }
        Ok(())
    }

    /// Connection parameters for an event source
    pub fn connect_params(&self) -> ConnectParams {
        let apps = self.apps.iter().map(|app| app.trim()).filter(|app| !app.is_empty());
        let mut transport = TransportOptions::default();
        if let Some(ms) = self.connect_timeout_ms {
            transport = transport.with_connect_timeout(Duration::from_millis(ms));
        }

        ConnectParams::new(&self.url, apps, Credentials::new(&self.username, &self.password))
            .with_subscribe_all(self.subscribe_all)
            .with_reconnect(self.reconnect)
            .with_retry(self.retry.clone())
            .with_transport(transport)
    }

    /// Log configuration summary
    pub fn log(&self) {
        info!("Configuration loaded:");
        info!("  Endpoint: {}", self.url);
        info!("  Applications: {}", self.apps.join(","));
        info!("  Username: {}", self.username);
        info!("  Subscribe all: {}", self.subscribe_all);
        info!("  Reconnect: {}", self.reconnect);
        match self.retry.max_retries {
            Some(n) => info!("  Max retries: {}", n),
            None => info!("  Max retries: unlimited"),
        }
        info!(
            "  Backoff: {}ms -> {}ms (x{})",
            self.retry.initial_delay_ms, self.retry.max_delay_ms, self.retry.factor
        );
        info!("  Log level: {}", self.log_level);
    }
}
