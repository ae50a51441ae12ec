//! Concrete building blocks: the tokio-tungstenite transport and the
//! atomic traffic counters.

pub mod metrics;
pub mod ws_transport;

pub use metrics::{AtomicMetrics, Metrics};
pub use ws_transport::{WsTransport, WsTransportFactory};
