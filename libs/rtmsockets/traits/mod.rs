//! # RtmSockets Traits
//!
//! Core traits and types shared by every transport implementation:
//!
//! - **Transport**: connect/send/close plus a stream of transport events
//! - **TransportFactory**: creates a fresh transport for each connection attempt
//! - **ReconnectionStrategy**: delay between reconnection attempts
//!
//! ## Example
//!
//! ```rust,ignore
//! use rtmsockets::*;
//!
//! let mut transport = WsTransportFactory::new(Some("json".into())).create();
//! transport.connect("wss://rtm.example.com/v2?appkey=k").await?;
//!
//! while let TransportEvent::Frame(message) = transport.next_event().await {
//!     println!("{:?}", message.as_text());
//! }
//! ```

pub mod error;
pub mod message;
pub mod reconnect;
pub mod transport;

// Re-export commonly used types
pub use error::{Result, SocketError};
pub use message::WsMessage;
pub use reconnect::{ExponentialBackoff, FixedDelay, NeverReconnect, ReconnectionStrategy};
pub use transport::{Transport, TransportEvent, TransportFactory};
