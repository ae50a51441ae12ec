use thiserror::Error;

/// Error type for the socket layer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SocketError {
    /// WebSocket protocol or I/O error
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Connection closed by the peer or the network
    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    /// Operation attempted on a transport that is not open
    #[error("Transport is not connected")]
    NotConnected,

    /// The connection request could not be built (bad URL or header)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Timeout error
    #[error("Operation timed out: {0}")]
    Timeout(String),
}

/// Result type for socket operations
pub type Result<T> = std::result::Result<T, SocketError>;
