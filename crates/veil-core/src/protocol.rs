//! Wire messages.
//!
//! Every message is a single compact JSON object discriminated by its
//! `event` field:
//!
//! ```text
//! {"event":"handshake","publicKey":"<base64>"}
//! {"event":"message","payload":{"iv":"<base64>","tag":"<base64>","ciphertext":"<base64>"}}
//! ```
//!
//! Field names are part of the wire contract and must not change.

use serde::{Deserialize, Serialize};

use crate::WireError;

/// Authenticated ciphertext for a single message.
///
/// All three fields are standard base64 (with padding). The envelope is
/// self-contained: given the session key it carries everything needed to
/// decrypt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub iv: String,
    pub tag: String,
    pub ciphertext: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum WireMessage {
    /// Ephemeral DH public value, sent once by each peer.
    Handshake {
        #[serde(rename = "publicKey")]
        public_key: String,
    },

    /// One sealed application payload.
    Message { payload: Envelope },
}

impl WireMessage {
    pub const HANDSHAKE: &'static str = "handshake";
    pub const MESSAGE: &'static str = "message";

    /// The `event` discriminator of this message.
    pub fn event(&self) -> &'static str {
        match self {
            WireMessage::Handshake { .. } => Self::HANDSHAKE,
            WireMessage::Message { .. } => Self::MESSAGE,
        }
    }

    /// Serialize to compact (newline-free) JSON.
    pub fn to_json(&self) -> Result<Vec<u8>, WireError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, WireError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Unwrap a handshake message, returning the encoded public value.
    pub fn into_handshake(self) -> Result<String, WireError> {
        match self {
            WireMessage::Handshake { public_key } => Ok(public_key),
            other => Err(WireError::UnexpectedEvent {
                expected: Self::HANDSHAKE,
                got: other.event(),
            }),
        }
    }

    /// Unwrap an application message, returning its envelope.
    pub fn into_envelope(self) -> Result<Envelope, WireError> {
        match self {
            WireMessage::Message { payload } => Ok(payload),
            other => Err(WireError::UnexpectedEvent {
                expected: Self::MESSAGE,
                got: other.event(),
            }),
        }
    }
}
