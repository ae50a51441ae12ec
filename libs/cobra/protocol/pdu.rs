use super::actions;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Client-assigned request identifier, echoed by the server in its response
pub type RequestId = u64;

/// Server metadata returned by a successful handshake
///
/// Only the nonce is required; it is valid for the handshake that produced it
/// and must never be reused on another connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeData {
    pub nonce: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
}

/// One protocol data unit
#[derive(Debug, Clone, PartialEq)]
pub enum Pdu {
    HandshakeRequest {
        id: RequestId,
        role: String,
    },
    HandshakeResponse {
        id: RequestId,
        data: HandshakeData,
    },
    AuthRequest {
        id: RequestId,
        hash: String,
    },
    /// `auth/authenticate/ok` when `ok`, `auth/authenticate/error` otherwise
    AuthResponse {
        id: RequestId,
        ok: bool,
        reason: Option<String>,
    },
    /// `position` resumes the stream where a previous subscription left off
    SubscribeRequest {
        id: RequestId,
        channel: String,
        filter: Option<String>,
        position: Option<String>,
    },
    SubscribeResponse {
        id: RequestId,
        subscription_id: Option<String>,
        position: Option<String>,
    },
    UnsubscribeRequest {
        id: RequestId,
        subscription_id: String,
    },
    UnsubscribeResponse {
        id: RequestId,
    },
    PublishRequest {
        id: RequestId,
        channel: String,
        message: Value,
    },
    PublishResponse {
        id: RequestId,
    },
    /// Server push; the server's own id on these frames is ignored
    SubscriptionData {
        subscription_id: Option<String>,
        channel: Option<String>,
        messages: Vec<Value>,
        position: Option<String>,
    },
    /// Any `<request>/error` response other than authentication
    ErrorResponse {
        action: String,
        id: Option<RequestId>,
        error: String,
    },
}

impl Pdu {
    /// The wire action of this PDU
    pub fn action(&self) -> &str {
        match self {
            Pdu::HandshakeRequest { .. } => actions::HANDSHAKE,
            Pdu::HandshakeResponse { .. } => actions::HANDSHAKE_OK,
            Pdu::AuthRequest { .. } => actions::AUTHENTICATE,
            Pdu::AuthResponse { ok: true, .. } => actions::AUTHENTICATE_OK,
            Pdu::AuthResponse { ok: false, .. } => actions::AUTHENTICATE_ERROR,
            Pdu::SubscribeRequest { .. } => actions::SUBSCRIBE,
            Pdu::SubscribeResponse { .. } => actions::SUBSCRIBE_OK,
            Pdu::UnsubscribeRequest { .. } => actions::UNSUBSCRIBE,
            Pdu::UnsubscribeResponse { .. } => actions::UNSUBSCRIBE_OK,
            Pdu::PublishRequest { .. } => actions::PUBLISH,
            Pdu::PublishResponse { .. } => actions::PUBLISH_OK,
            Pdu::SubscriptionData { .. } => actions::SUBSCRIPTION_DATA,
            Pdu::ErrorResponse { action, .. } => action,
        }
    }

    /// The request id carried by this PDU, if any
    pub fn id(&self) -> Option<RequestId> {
        match self {
            Pdu::HandshakeRequest { id, .. }
            | Pdu::HandshakeResponse { id, .. }
            | Pdu::AuthRequest { id, .. }
            | Pdu::AuthResponse { id, .. }
            | Pdu::SubscribeRequest { id, .. }
            | Pdu::SubscribeResponse { id, .. }
            | Pdu::UnsubscribeRequest { id, .. }
            | Pdu::UnsubscribeResponse { id }
            | Pdu::PublishRequest { id, .. }
            | Pdu::PublishResponse { id } => Some(*id),
            Pdu::SubscriptionData { .. } => None,
            Pdu::ErrorResponse { id, .. } => *id,
        }
    }
}
