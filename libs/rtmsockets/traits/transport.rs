use crate::error::Result;
use crate::message::WsMessage;
use async_trait::async_trait;

/// Events delivered by a transport, in the order they happened
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The socket is open; always the first event after a successful `connect`
    Opened,
    /// A complete data frame arrived
    Frame(WsMessage),
    /// The socket closed or failed; no further events follow
    Closed(Option<String>),
}

/// Trait for a full-duplex, message-oriented socket
///
/// A transport owns exactly one socket for exactly one connection. It never
/// reconnects on its own: once `Closed` has been delivered, the owner drops it
/// and asks its `TransportFactory` for a fresh one.
#[async_trait]
pub trait Transport: Send {
    /// Open the socket
    ///
    /// On success the next call to `next_event` yields `TransportEvent::Opened`.
    async fn connect(&mut self, url: &str) -> Result<()>;

    /// Send one complete frame
    ///
    /// Callers must serialize sends; `&mut self` guarantees two writes to the
    /// same socket never interleave.
    async fn send(&mut self, message: WsMessage) -> Result<()>;

    /// Wait for the next transport event
    ///
    /// Must be cancellation safe: dropping the future before it resolves must
    /// not lose a frame.
    async fn next_event(&mut self) -> TransportEvent;

    /// Close the socket; closing an already closed transport is not an error
    async fn close(&mut self) -> Result<()>;
}

/// Creates transports, one per connection attempt
pub trait TransportFactory: Send + Sync {
    fn create(&self) -> Box<dyn Transport>;
}
