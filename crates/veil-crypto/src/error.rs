//! Errors for the handshake engine and envelope codec.
//!
//! Every variant is fatal for the session that produced it. Messages never
//! include key material, and `InvalidPeerKey` / `Authentication` carry no
//! detail about which check failed.

use thiserror::Error;
use veil_core::WireError;

pub type Result<T> = std::result::Result<T, CryptoError>;

#[derive(Debug, Error)]
pub enum CryptoError {
    /// Group parameters are unusable (misconfiguration).
    #[error("invalid group parameters: {0}")]
    Parameter(String),

    /// A wire field could not be decoded (JSON, base64, or length).
    #[error("decode error: {0}")]
    Decode(String),

    /// The peer's public value is outside the valid subgroup.
    #[error("invalid peer public key")]
    InvalidPeerKey,

    /// AEAD tag verification failed.
    #[error("authentication failed")]
    Authentication,
}

impl CryptoError {
    pub fn parameter(msg: impl std::fmt::Display) -> Self {
        Self::Parameter(msg.to_string())
    }

    pub fn decode(msg: impl std::fmt::Display) -> Self {
        Self::Decode(msg.to_string())
    }
}

impl From<WireError> for CryptoError {
    fn from(err: WireError) -> Self {
        Self::Decode(err.to_string())
    }
}
