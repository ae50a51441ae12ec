//! # Cobra
//!
//! Client for the Cobra real-time messaging (RTM) service.
//!
//! A client opens a WebSocket to `{endpoint}/v2?appkey=…`, performs the
//! role-secret handshake, subscribes to one channel and hands every pushed
//! message to a callback. Dropped connections are rebuilt from scratch
//! (fresh socket, fresh nonce) under a reconnect policy.
//!
//! ## Example
//!
//! ```rust,ignore
//! use cobra::{CobraClient, ConnectionConfig};
//!
//! let client = CobraClient::builder()
//!     .config(ConnectionConfig::new("wss://rtm.example.com", "appkey", "role", "secret"))
//!     .channel("lobby")
//!     .on_message(|message| println!("{}", message))
//!     .build()
//!     .await?;
//!
//! client.publish("lobby", serde_json::json!({"text": "hello"}))?;
//! client.stop();
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod logging;
pub mod protocol;
pub mod reconnect;
pub mod subscription;

pub use auth::{compute_hash, AuthError, AuthNegotiator};
pub use client::{builder, CobraClient, CobraClientBuilder};
pub use config::{ClientSettings, CobraConfig, ConfigError, ConnectionConfig};
pub use connection::{ConnectionEvent, ConnectionState};
pub use dispatcher::{EventDispatcher, EventKind, RtmEvent};
pub use error::{CloseCause, CobraError, Result};
pub use protocol::{DecodeError, Pdu};
pub use reconnect::{Decision, ReconnectPolicy};
pub use subscription::{default_filter, Subscription, SubscriptionManager};

// Socket layer types that appear in this crate's API
pub use rtmsockets::{ExponentialBackoff, FixedDelay, Metrics, NeverReconnect, ReconnectionStrategy, TransportFactory};
