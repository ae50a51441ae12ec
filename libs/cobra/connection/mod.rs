//! Connection lifecycle
//!
//! `ConnectionStateMachine` runs inside one tokio task and owns the transport;
//! client handles talk to it through [`Command`]s and observe it through the
//! shared [`AtomicConnectionState`] and the [`ConnectionEvent`] stream.

pub mod machine;
pub mod state;

pub use machine::{Command, ConnectionEvent, ConnectionStateMachine, PublishAck};
pub use state::{AtomicConnectionState, ConnectionState};
