//! Role-secret authentication
//!
//! The server issues a nonce in its handshake response; the client proves it
//! knows the role secret by returning `base64(HMAC-MD5(secret, nonce))`.
//! MD5 is mandated by the wire protocol.

use crate::protocol::{Pdu, RequestId};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use md5::Md5;
use std::fmt;
use thiserror::Error;

type HmacMd5 = Hmac<Md5>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("HMAC error: {0}")]
    Hmac(String),
}

/// Compute the authentication hash for `nonce` keyed by `secret`
pub fn compute_hash(secret: &str, nonce: &str) -> Result<String, AuthError> {
    let mut mac = HmacMd5::new_from_slice(secret.as_bytes()).map_err(|e| AuthError::Hmac(e.to_string()))?;
    mac.update(nonce.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Builds the handshake and authenticate requests for one role
#[derive(Clone)]
pub struct AuthNegotiator {
    role: String,
    secret: String,
}

impl AuthNegotiator {
    pub fn new(role: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            secret: secret.into(),
        }
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn handshake_request(&self, id: RequestId) -> Pdu {
        Pdu::HandshakeRequest {
            id,
            role: self.role.clone(),
        }
    }

    /// Answer the challenge `nonce` from the handshake response
    pub fn auth_request(&self, id: RequestId, nonce: &str) -> Result<Pdu, AuthError> {
        Ok(Pdu::AuthRequest {
            id,
            hash: compute_hash(&self.secret, nonce)?,
        })
    }
}

impl fmt::Debug for AuthNegotiator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthNegotiator")
            .field("role", &self.role)
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rfc2202_vectors() {
        let key = String::from_utf8(vec![0x0b; 16]).unwrap();
        assert_eq!(compute_hash(&key, "Hi There").unwrap(), "kpRyejY4uxwT9I74FYv8nQ==");
        assert_eq!(
            compute_hash("Jefe", "what do ya want for nothing?").unwrap(),
            "dQx4PmqwtQPqqG4xCl23OA=="
        );
    }

    #[test]
    fn test_known_nonce_vectors() {
        assert_eq!(compute_hash("s", "abc").unwrap(), "Wwpaa7PO5aWiP0VjN0w4rQ==");
        assert_eq!(
            compute_hash("ccc02DE4Ed8CAB9aEfC8De3e13BfBE5E", "abc").unwrap(),
            "XooA6IyuZIURDeRcJ1OiQw=="
        );
    }

    #[test]
    fn test_hash_is_deterministic() {
        let first = compute_hash("secret", "nonce-1").unwrap();
        assert_eq!(first, compute_hash("secret", "nonce-1").unwrap());
        assert_ne!(first, compute_hash("secret", "nonce-2").unwrap());
        // 16-byte digest, padded base64
        assert_eq!(first.len(), 24);
    }

    #[test]
    fn test_negotiator_requests() {
        let negotiator = AuthNegotiator::new("r", "s");
        assert_eq!(negotiator.handshake_request(0), Pdu::HandshakeRequest { id: 0, role: "r".into() });
        assert_eq!(
            negotiator.auth_request(1, "abc").unwrap(),
            Pdu::AuthRequest { id: 1, hash: "Wwpaa7PO5aWiP0VjN0w4rQ==".into() }
        );
    }

    #[test]
    fn test_debug_redacts_secret() {
        let rendered = format!("{:?}", AuthNegotiator::new("r", "top-secret"));
        assert!(!rendered.contains("top-secret"));
    }
}
