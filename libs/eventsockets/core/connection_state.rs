//! Lock-free connection state and counters shared between a
//! [`ConnectionManager`](crate::core::client::ConnectionManager) handle and
//! its driver task.

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

/// Connection lifecycle
///
/// `Idle → Connecting → Open → Disconnected → Connecting ... → Closed`.
/// `Disconnected` is transient; `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ConnectionState {
    Idle = 0,
    Connecting = 1,
    Open = 2,
    Disconnected = 3,
    Closed = 4,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ConnectionState::Idle,
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Open,
            3 => ConnectionState::Disconnected,
            _ => ConnectionState::Closed,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Atomic wrapper around [`ConnectionState`]
#[derive(Debug)]
pub struct AtomicConnectionState(AtomicU8);

impl AtomicConnectionState {
    pub fn new(state: ConnectionState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    #[inline]
    pub fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Store a new state unless the current one is `Closed`
    ///
    /// Returns `false` when the state was already terminal.
    pub fn set(&self, state: ConnectionState) -> bool {
        let mut current = self.0.load(Ordering::Acquire);
        loop {
            if current == ConnectionState::Closed as u8 {
                return false;
            }
            match self.0.compare_exchange_weak(
                current,
                state as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.get() == ConnectionState::Open
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.get() == ConnectionState::Closed
    }
}

/// Counters updated by the driver task
#[derive(Debug, Default)]
pub struct AtomicMetrics {
    connect_attempts: AtomicU64,
    reconnects: AtomicU64,
    messages_received: AtomicU64,
    messages_sent: AtomicU64,
}

impl AtomicMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn increment_attempts(&self) {
        self.connect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_reconnects(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_sent(&self) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connect_attempts(&self) -> u64 {
        self.connect_attempts.load(Ordering::Relaxed)
    }

    pub fn reconnect_count(&self) -> u64 {
        self.reconnects.load(Ordering::Relaxed)
    }

    pub fn messages_received(&self) -> u64 {
        self.messages_received.load(Ordering::Relaxed)
    }

    pub fn messages_sent(&self) -> u64 {
        self.messages_sent.load(Ordering::Relaxed)
    }
}

/// Point-in-time copy of a manager's counters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metrics {
    pub connect_attempts: u64,
    pub reconnect_count: u64,
    pub messages_received: u64,
    pub messages_sent: u64,
    pub state: ConnectionState,
}
