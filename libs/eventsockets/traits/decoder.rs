use serde_json::Value;
use tracing::debug;

/// Best-effort structured decoding of text frames
///
/// Returning `None` means "not structured data": the raw text is
/// forwarded unchanged. Decoders never raise errors.
pub trait MessageDecoder: Send + Sync + 'static {
    fn decode(&self, text: &str) -> Option<Value>;
}

/// Decodes text frames as JSON
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDecoder;

impl MessageDecoder for JsonDecoder {
    fn decode(&self, text: &str) -> Option<Value> {
        match serde_json::from_str(text) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!("Frame is not JSON, forwarding raw text: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_objects() {
        assert_eq!(JsonDecoder.decode(r#"{"foo": "bar"}"#), Some(json!({"foo": "bar"})));
    }

    #[test]
    fn rejects_plain_text() {
        assert_eq!(JsonDecoder.decode("hidey ho"), None);
    }
}
