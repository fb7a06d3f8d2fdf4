//! # Event stream sources
//!
//! Build the event endpoint address from credentials and application
//! names, and expose the decoded event stream either with a dedicated
//! connection ([`DirectSource`]) or as a lazily started, reference-counted
//! stream shared by all subscribers ([`SharedSource`]).

pub mod address;
pub mod direct;
pub mod params;
pub mod shared;

pub use address::{build_connection_url, Credentials};
pub use direct::DirectSource;
pub use params::{ConnectParams, DEFAULT_MAX_RETRIES};
pub use shared::{SharedSource, SharedSubscription};
