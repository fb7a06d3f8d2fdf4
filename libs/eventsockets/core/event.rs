use crate::traits::{SocketError, WsMessage};
use serde_json::Value;

/// Message payload delivered to subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Raw text frame (not decoded, or not structured data)
    Text(String),
    /// Raw binary frame
    Binary(Vec<u8>),
    /// Text frame decoded into structured data
    Json(Value),
}

impl Payload {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Payload::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_binary(&self) -> Option<&[u8]> {
        match self {
            Payload::Binary(data) => Some(data),
            _ => None,
        }
    }
}

impl From<WsMessage> for Payload {
    fn from(message: WsMessage) -> Self {
        match message {
            WsMessage::Text(text) => Payload::Text(text),
            WsMessage::Binary(data) => Payload::Binary(data),
        }
    }
}

/// Why an open transport was lost
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    Error,
    Close,
}

/// Details carried by [`SocketEvent::Disconnected`]
#[derive(Debug, Clone, PartialEq)]
pub struct DisconnectDetails {
    pub reason: DisconnectReason,
    /// Set when `reason` is `Error`
    pub error: Option<SocketError>,
    /// Close code, when the remote side sent one
    pub code: Option<u16>,
    /// Close reason text, when the remote side sent one
    pub message: Option<String>,
}

impl DisconnectDetails {
    pub fn error(error: SocketError) -> Self {
        Self {
            reason: DisconnectReason::Error,
            error: Some(error),
            code: None,
            message: None,
        }
    }

    pub fn close(code: Option<u16>, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            reason: DisconnectReason::Close,
            error: None,
            code,
            message: (!message.is_empty()).then_some(message),
        }
    }
}

/// Lifecycle and data events re-exposed by a connection
///
/// - `Open`: first successful connection
/// - `Message`: data frame, in transport order
/// - `Disconnected`: an open transport was lost and reconnection starts
/// - `Reconnected`: a connection was re-established after `Disconnected`
/// - `Error`: terminal failure (always followed by `Close`) or a
///   non-terminal misuse report such as pinging without a transport
/// - `Close`: terminal, emitted exactly once
#[derive(Debug, Clone, PartialEq)]
pub enum SocketEvent {
    Open,
    Message(Payload),
    Disconnected(DisconnectDetails),
    Reconnected,
    Error(SocketError),
    Close,
}

impl SocketEvent {
    /// Event name, as used in log output
    pub fn name(&self) -> &'static str {
        match self {
            SocketEvent::Open => "open",
            SocketEvent::Message(_) => "message",
            SocketEvent::Disconnected(_) => "disconnected",
            SocketEvent::Reconnected => "reconnected",
            SocketEvent::Error(_) => "error",
            SocketEvent::Close => "close",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SocketEvent::Close)
    }
}
