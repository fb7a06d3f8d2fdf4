use async_trait::async_trait;
use std::collections::HashMap;

/// HTTP headers to send with the WebSocket handshake
pub type Headers = HashMap<String, String>;

/// Trait for providing handshake headers dynamically
///
/// Called on every connect attempt, including reconnects, so headers
/// such as tokens or nonces can be regenerated.
///
/// # Example
/// ```ignore
/// struct BearerToken(String);
///
/// #[async_trait::async_trait]
/// impl HeaderProvider for BearerToken {
///     async fn get_headers(&self) -> Headers {
///         let mut headers = Headers::new();
///         headers.insert("Authorization".into(), format!("Bearer {}", self.0));
///         headers
///     }
/// }
/// ```
#[async_trait]
pub trait HeaderProvider: Send + Sync {
    /// Generate headers for the next handshake
    async fn get_headers(&self) -> Headers;
}

/// Header provider that always returns the same set
#[derive(Debug, Clone, Default)]
pub struct StaticHeaders(Headers);

impl StaticHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }
}

#[async_trait]
impl HeaderProvider for StaticHeaders {
    async fn get_headers(&self) -> Headers {
        self.0.clone()
    }
}
