use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle state of a Cobra connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    Disconnected = 0,
    Connecting = 1,
    HandshakeSent = 2,
    Authenticating = 3,
    Authenticated = 4,
    Subscribed = 5,
    Closing = 6,
    Closed = 7,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::HandshakeSent,
            3 => ConnectionState::Authenticating,
            4 => ConnectionState::Authenticated,
            5 => ConnectionState::Subscribed,
            6 => ConnectionState::Closing,
            7 => ConnectionState::Closed,
            _ => ConnectionState::Disconnected,
        }
    }

    /// Publishing is allowed from here on
    pub fn is_authenticated(self) -> bool {
        matches!(self, ConnectionState::Authenticated | ConnectionState::Subscribed)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::HandshakeSent => "handshake-sent",
            ConnectionState::Authenticating => "authenticating",
            ConnectionState::Authenticated => "authenticated",
            ConnectionState::Subscribed => "subscribed",
            ConnectionState::Closing => "closing",
            ConnectionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Connection state readable from any thread without locking
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

    #[inline]
    pub fn set(&self, state: ConnectionState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

impl Default for AtomicConnectionState {
    fn default() -> Self {
        Self::new(ConnectionState::Disconnected)
    }
}
