use super::actions;
use super::pdu::{HandshakeData, Pdu, RequestId};
use rtmsockets::WsMessage;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use thiserror::Error;

/// A frame that could not be turned into a PDU
///
/// `raw` keeps the offending payload for diagnostics.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Decode error: {reason}")]
pub struct DecodeError {
    pub reason: String,
    pub raw: String,
}

impl DecodeError {
    fn new(reason: impl Into<String>, raw: &str) -> Self {
        Self {
            reason: reason.into(),
            raw: raw.to_string(),
        }
    }
}

// ============================================================================
// Encoding
// ============================================================================

/// Serialize a PDU to its compact wire text
pub fn encode(pdu: &Pdu) -> String {
    let mut frame = Map::new();
    frame.insert("action".into(), Value::String(pdu.action().to_string()));
    if let Some(id) = pdu.id() {
        frame.insert("id".into(), json!(id));
    }
    if let Some(body) = encode_body(pdu) {
        frame.insert("body".into(), body);
    }
    Value::Object(frame).to_string()
}

fn encode_body(pdu: &Pdu) -> Option<Value> {
    match pdu {
        Pdu::HandshakeRequest { role, .. } => Some(json!({
            "method": actions::ROLE_SECRET_METHOD,
            "data": { "role": role },
        })),
        Pdu::HandshakeResponse { data, .. } => {
            let mut fields = Map::new();
            fields.insert("nonce".into(), json!(data.nonce));
            insert_opt(&mut fields, "version", &data.version);
            insert_opt(&mut fields, "connection_id", &data.connection_id);
            insert_opt(&mut fields, "node", &data.node);
            Some(json!({ "data": fields }))
        }
        Pdu::AuthRequest { hash, .. } => Some(json!({
            "method": actions::ROLE_SECRET_METHOD,
            "credentials": { "hash": hash },
        })),
        Pdu::AuthResponse { ok: true, .. } => None,
        Pdu::AuthResponse { ok: false, reason, .. } => {
            let mut fields = Map::new();
            fields.insert("error".into(), json!("authentication_failed"));
            insert_opt(&mut fields, "reason", reason);
            Some(Value::Object(fields))
        }
        Pdu::SubscribeRequest {
            channel, filter, position, ..
        } => {
            let mut fields = Map::new();
            fields.insert("channel".into(), json!(channel));
            insert_opt(&mut fields, "filter", filter);
            insert_opt(&mut fields, "position", position);
            Some(Value::Object(fields))
        }
        Pdu::SubscribeResponse {
            subscription_id,
            position,
            ..
        } => {
            let mut fields = Map::new();
            insert_opt(&mut fields, "subscription_id", subscription_id);
            insert_opt(&mut fields, "position", position);
            Some(Value::Object(fields))
        }
        Pdu::UnsubscribeRequest { subscription_id, .. } => {
            Some(json!({ "subscription_id": subscription_id }))
        }
        Pdu::UnsubscribeResponse { .. } | Pdu::PublishResponse { .. } => None,
        Pdu::PublishRequest { channel, message, .. } => Some(json!({
            "channel": channel,
            "message": message,
        })),
        Pdu::SubscriptionData {
            subscription_id,
            channel,
            messages,
            position,
        } => {
            let mut fields = Map::new();
            insert_opt(&mut fields, "subscription_id", subscription_id);
            insert_opt(&mut fields, "channel", channel);
            fields.insert("messages".into(), Value::Array(messages.clone()));
            insert_opt(&mut fields, "position", position);
            Some(Value::Object(fields))
        }
        Pdu::ErrorResponse { error, .. } => Some(json!({ "error": error })),
    }
}

fn insert_opt(fields: &mut Map<String, Value>, key: &str, value: &Option<String>) {
    if let Some(value) = value {
        fields.insert(key.to_string(), Value::String(value.clone()));
    }
}

// ============================================================================
// Decoding
// ============================================================================

#[derive(Deserialize)]
struct Envelope {
    action: String,
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    body: Option<Value>,
}

#[derive(Deserialize)]
struct HandshakeRequestBody {
    method: String,
    data: RoleData,
}

#[derive(Deserialize)]
struct RoleData {
    role: String,
}

#[derive(Deserialize)]
struct HandshakeResponseBody {
    data: HandshakeData,
}

#[derive(Deserialize)]
struct AuthRequestBody {
    method: String,
    credentials: Credentials,
}

#[derive(Deserialize)]
struct Credentials {
    hash: String,
}

#[derive(Deserialize, Default)]
struct ErrorBody {
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    reason: Option<Value>,
}

#[derive(Deserialize)]
struct SubscribeRequestBody {
    channel: String,
    #[serde(default)]
    filter: Option<String>,
    #[serde(default)]
    position: Option<String>,
}

#[derive(Deserialize, Default)]
struct SubscribeResponseBody {
    #[serde(default)]
    subscription_id: Option<String>,
    #[serde(default)]
    position: Option<String>,
}

#[derive(Deserialize)]
struct UnsubscribeRequestBody {
    subscription_id: String,
}

#[derive(Deserialize)]
struct PublishRequestBody {
    channel: String,
    message: Value,
}

#[derive(Deserialize)]
struct SubscriptionDataBody {
    #[serde(default)]
    subscription_id: Option<String>,
    #[serde(default)]
    channel: Option<String>,
    messages: Vec<Value>,
    #[serde(default)]
    position: Option<String>,
}

/// Parse wire text into a PDU
///
/// Syntactically valid JSON with missing or mistyped fields is reported as a
/// `DecodeError`, never a panic.
pub fn decode(raw: &str) -> Result<Pdu, DecodeError> {
    let envelope: Envelope =
        serde_json::from_str(raw).map_err(|e| DecodeError::new(format!("invalid frame: {}", e), raw))?;
    let action = envelope.action.as_str();

    let pdu = match action {
        actions::HANDSHAKE => {
            let body: HandshakeRequestBody = required_body(&envelope, raw)?;
            check_method(&body.method, raw)?;
            Pdu::HandshakeRequest {
                id: required_id(&envelope, raw)?,
                role: body.data.role,
            }
        }
        actions::HANDSHAKE_OK => {
            let body: HandshakeResponseBody = required_body(&envelope, raw)?;
            Pdu::HandshakeResponse {
                id: required_id(&envelope, raw)?,
                data: body.data,
            }
        }
        actions::AUTHENTICATE => {
            let body: AuthRequestBody = required_body(&envelope, raw)?;
            check_method(&body.method, raw)?;
            Pdu::AuthRequest {
                id: required_id(&envelope, raw)?,
                hash: body.credentials.hash,
            }
        }
        actions::AUTHENTICATE_OK => Pdu::AuthResponse {
            id: required_id(&envelope, raw)?,
            ok: true,
            reason: None,
        },
        actions::AUTHENTICATE_ERROR => {
            let body: ErrorBody = optional_body(&envelope, raw)?;
            Pdu::AuthResponse {
                id: required_id(&envelope, raw)?,
                ok: false,
                reason: body.reason.as_ref().map(value_text),
            }
        }
        actions::SUBSCRIBE => {
            let body: SubscribeRequestBody = required_body(&envelope, raw)?;
            Pdu::SubscribeRequest {
                id: required_id(&envelope, raw)?,
                channel: body.channel,
                filter: body.filter,
                position: body.position,
            }
        }
        actions::SUBSCRIBE_OK => {
            let body: SubscribeResponseBody = optional_body(&envelope, raw)?;
            Pdu::SubscribeResponse {
                id: required_id(&envelope, raw)?,
                subscription_id: body.subscription_id,
                position: body.position,
            }
        }
        actions::UNSUBSCRIBE => {
            let body: UnsubscribeRequestBody = required_body(&envelope, raw)?;
            Pdu::UnsubscribeRequest {
                id: required_id(&envelope, raw)?,
                subscription_id: body.subscription_id,
            }
        }
        actions::UNSUBSCRIBE_OK => Pdu::UnsubscribeResponse {
            id: required_id(&envelope, raw)?,
        },
        actions::PUBLISH => {
            let body: PublishRequestBody = required_body(&envelope, raw)?;
            Pdu::PublishRequest {
                id: required_id(&envelope, raw)?,
                channel: body.channel,
                message: body.message,
            }
        }
        actions::PUBLISH_OK => Pdu::PublishResponse {
            id: required_id(&envelope, raw)?,
        },
        actions::SUBSCRIPTION_DATA => {
            let body: SubscriptionDataBody = required_body(&envelope, raw)?;
            if body.subscription_id.is_none() && body.channel.is_none() {
                return Err(DecodeError::new(
                    "subscription data names neither a channel nor a subscription id",
                    raw,
                ));
            }
            Pdu::SubscriptionData {
                subscription_id: body.subscription_id,
                channel: body.channel,
                messages: body.messages,
                position: body.position,
            }
        }
        other if other.ends_with(actions::ERROR_SUFFIX) => {
            let body: ErrorBody = optional_body(&envelope, raw)?;
            let error = match (body.error.as_ref(), body.reason.as_ref()) {
                (Some(error), Some(reason)) => format!("{}: {}", value_text(error), value_text(reason)),
                (Some(error), None) => value_text(error),
                (None, Some(reason)) => value_text(reason),
                (None, None) => "unspecified error".to_string(),
            };
            Pdu::ErrorResponse {
                action: other.to_string(),
                id: envelope.id.as_ref().and_then(Value::as_u64),
                error,
            }
        }
        other => return Err(DecodeError::new(format!("unknown action '{}'", other), raw)),
    };

    Ok(pdu)
}

/// Decode a transport frame; binary frames must hold UTF-8 text
pub fn decode_message(message: &WsMessage) -> Result<Pdu, DecodeError> {
    match message {
        WsMessage::Text(text) => decode(text),
        WsMessage::Binary(data) => match std::str::from_utf8(data) {
            Ok(text) => decode(text),
            Err(e) => Err(DecodeError::new(
                format!("binary frame is not UTF-8: {}", e),
                &String::from_utf8_lossy(data),
            )),
        },
    }
}

fn required_id(envelope: &Envelope, raw: &str) -> Result<RequestId, DecodeError> {
    match envelope.id.as_ref() {
        Some(id) => id
            .as_u64()
            .ok_or_else(|| DecodeError::new(format!("'{}' id is not an unsigned integer", envelope.action), raw)),
        None => Err(DecodeError::new(format!("'{}' is missing its id", envelope.action), raw)),
    }
}

fn required_body<T: DeserializeOwned>(envelope: &Envelope, raw: &str) -> Result<T, DecodeError> {
    let body = envelope
        .body
        .as_ref()
        .ok_or_else(|| DecodeError::new(format!("'{}' is missing its body", envelope.action), raw))?;
    parse_body(&envelope.action, body, raw)
}

fn optional_body<T: DeserializeOwned + Default>(envelope: &Envelope, raw: &str) -> Result<T, DecodeError> {
    match envelope.body.as_ref() {
        None | Some(Value::Null) => Ok(T::default()),
        Some(body) => parse_body(&envelope.action, body, raw),
    }
}

fn parse_body<T: DeserializeOwned>(action: &str, body: &Value, raw: &str) -> Result<T, DecodeError> {
    T::deserialize(body).map_err(|e| DecodeError::new(format!("malformed '{}' body: {}", action, e), raw))
}

fn check_method(method: &str, raw: &str) -> Result<(), DecodeError> {
    if method == actions::ROLE_SECRET_METHOD {
        Ok(())
    } else {
        Err(DecodeError::new(format!("unsupported auth method '{}'", method), raw))
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
