//! # RtmSockets
//!
//! The socket layer underneath the Cobra RTM client.
//!
//! ## Features
//!
//! - **Transport seam**: a `Transport` trait delivering three events
//!   (opened, frame received, closed) so protocol code never touches the socket
//! - **tokio-tungstenite backend**: `WsTransport` with sub-protocol negotiation
//!   and no fixed receive buffer, frames of any size are read whole
//! - **Reconnection strategies**: fixed delay, exponential backoff, never
//! - **Atomic metrics**: lock-free traffic counters shared across tasks
//!
//! Reconnection is decided above this layer; a `Transport` only ever lives
//! for one connection.

pub mod traits;
pub mod core;

// Re-export all traits
pub use traits::*;

// Re-export core functionality
pub use self::core::{
    metrics::{AtomicMetrics, Metrics},
    ws_transport::{WsTransport, WsTransportFactory},
};

/// Type alias for Result with SocketError
pub type Result<T> = std::result::Result<T, traits::SocketError>;
