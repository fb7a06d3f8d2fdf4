//! Binary runner utilities
//!
//! Banners, heartbeat settings and Ctrl+C handling shared by binaries.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::Notify;
use tracing::info;

/// Configuration for running a binary application
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Name of the binary (for logging)
    pub name: String,
    /// Heartbeat interval in seconds
    pub heartbeat_interval_secs: u64,
}

impl RunConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            heartbeat_interval_secs: 300, // 5 minutes default
        }
    }

    pub fn with_heartbeat(mut self, secs: u64) -> Self {
        self.heartbeat_interval_secs = secs;
        self
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs.max(1))
    }

    pub fn print_banner(&self) {
        info!("");
        info!("========================================");
        info!("Starting {}", self.name);
        info!("Press Ctrl+C to stop");
        info!("========================================");
        info!("");
    }

    pub fn print_shutdown(&self, stats: Option<&str>) {
        info!("");
        info!("========================================");
        info!("{} stopped gracefully", self.name);
        if let Some(stats) = stats {
            info!("{}", stats);
        }
        info!("========================================");
    }
}

/// Ctrl+C driven shutdown signal
#[derive(Clone, Default)]
pub struct ShutdownSignal {
    triggered: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a Ctrl+C handler that triggers shutdown
    pub fn spawn_signal_handler(&self) {
        let this = self.clone();
        tokio::spawn(async move {
            if signal::ctrl_c().await.is_ok() {
                info!("");
                info!("Received shutdown signal (Ctrl+C)");
                info!("Shutting down gracefully...");
                this.trigger();
            }
        });
    }

    pub fn trigger(&self) {
        self.triggered.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    pub fn is_running(&self) -> bool {
        !self.triggered.load(Ordering::Acquire)
    }

    /// Resolve once shutdown has been triggered
    pub async fn wait(&self) {
        loop {
            let notified = self.notify.notified();
            if !self.is_running() {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_config_builder() {
        let config = RunConfig::new("test-binary").with_heartbeat(120);

        assert_eq!(config.name, "test-binary");
        assert_eq!(config.heartbeat_interval(), Duration::from_secs(120));
    }

    #[tokio::test]
    async fn test_shutdown_wakes_waiters() {
        let shutdown = ShutdownSignal::new();
        let waiter = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move { shutdown.wait().await })
        };

        tokio::task::yield_now().await;
        assert!(shutdown.is_running());
        shutdown.trigger();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(!shutdown.is_running());
    }
}
