use thiserror::Error;

/// Main error type for eventsockets
///
/// Errors are cloneable so that a single failure can be fanned out to
/// every subscriber of a connection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SocketError {
    /// Transport could not be opened
    #[error("Connect error: {0}")]
    Connect(String),

    /// WebSocket protocol or I/O error on an open transport
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Transport ended without a close handshake
    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    /// Operation needs an open transport but none is available
    #[error("Transport unavailable: {0}")]
    TransportUnavailable(String),

    /// Endpoint address could not be parsed or built
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Retry budget exhausted, carries the last underlying failure
    #[error("Reconnection failed after {attempts} attempts: {source}")]
    ReconnectionFailed {
        attempts: usize,
        #[source]
        source: Box<SocketError>,
    },

    /// Timeout error
    #[error("Operation timed out: {0}")]
    Timeout(String),
}

impl SocketError {
    /// The innermost failure, unwrapping `ReconnectionFailed`
    pub fn root_cause(&self) -> &SocketError {
        match self {
            SocketError::ReconnectionFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Result type for eventsockets operations
pub type Result<T> = std::result::Result<T, SocketError>;
