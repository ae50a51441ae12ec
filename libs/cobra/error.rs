use crate::auth::AuthError;
use crate::protocol::DecodeError;
use rtmsockets::SocketError;
use thiserror::Error;

/// Main error type for the Cobra client
///
/// Every failure inside a connection funnels into one of these variants
/// before it reaches the reconnect decision, see [`CobraError::close_cause`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CobraError {
    /// Connect/send failure or unexpected close
    #[error("Transport error: {0}")]
    Transport(#[from] SocketError),

    /// Malformed or out-of-sequence PDU
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A frame could not be decoded into a PDU
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The authentication response could not be computed
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The server rejected our credentials
    #[error("Authentication rejected: {0}")]
    AuthRejected(String),

    /// The server answered a request with an error action
    #[error("{action} rejected by server: {error}")]
    Rejected { action: String, error: String },

    /// A bounded wait expired
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Publish attempted before the connection authenticated
    #[error("Not authenticated")]
    NotAuthenticated,

    /// The client was stopped
    #[error("Client stopped")]
    Stopped,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Why a connection ended, as seen by the reconnect policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseCause {
    Transport,
    Protocol,
    AuthRejected,
}

impl CobraError {
    /// Classify this error for the reconnect decision
    pub fn close_cause(&self) -> CloseCause {
        match self {
            CobraError::Transport(_) | CobraError::Timeout(_) => CloseCause::Transport,
            CobraError::AuthRejected(_) => CloseCause::AuthRejected,
            _ => CloseCause::Protocol,
        }
    }
}

/// Result type for Cobra operations
pub type Result<T> = std::result::Result<T, CobraError>;
