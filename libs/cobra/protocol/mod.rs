//! Cobra RTM wire protocol
//!
//! Every frame is a JSON object with an `action`, an optional request `id`
//! and an action-specific `body`. Requests carry a client-assigned id that
//! the server echoes in its `<action>/ok` or `<action>/error` response;
//! subscription pushes are identified by their subscription id instead.

pub mod actions;
pub mod codec;
pub mod pdu;

pub use codec::{decode, decode_message, encode, DecodeError};
pub use pdu::{HandshakeData, Pdu, RequestId};
