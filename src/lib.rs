//! ARI Event Stream - Main Library
//!
//! Tails the event stream of an Asterisk REST Interface application over
//! a reconnecting WebSocket.
//!
//! ## Architecture
//!
//! - **eventsockets**: connector library (re-exported from workspace)
//! - **config**: YAML configuration with environment overrides
//! - **logging**: tracing subscriber setup
//! - **bin_common**: Common utilities for binary executables (CLI, runners)
//!
//! ## Usage in Binaries
//!
//! ```rust
//! use ari_event_stream::bin_common::{load_config_from_env, ConfigType};
//! use ari_event_stream::config::EventsConfig;
//! ```

// Re-export workspace libraries for convenience
pub use eventsockets;

pub mod config;
pub mod logging;

// Binary common utilities
pub mod bin_common {
    //! Common utilities for binary executables

    pub mod cli;
    pub mod runner;

    pub use cli::{config_path_from_args, load_config_from_env, parse_args, ConfigType};
    pub use runner::{RunConfig, ShutdownSignal};
}
