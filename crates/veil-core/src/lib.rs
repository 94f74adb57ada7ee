//! Core Veil wire protocol types and stream framing.
//!
//! This crate provides:
//! - The JSON wire messages exchanged by peers (`handshake`, `message`)
//! - The encrypted envelope layout carried inside application messages
//! - Pluggable framing for delimiting messages on a byte stream
//!
//! Nothing in here touches key material; see `veil-crypto` for that.

#![forbid(unsafe_code)]

pub mod framing;
pub mod protocol;

pub use framing::{encode_frame, FrameDecoder, FrameError, Framing, DEFAULT_MAX_FRAME_LEN};
pub use protocol::{Envelope, WireMessage};

/// Length of the AES-GCM nonce carried in `Envelope::iv`.
pub const NONCE_LEN: usize = 12;

/// Length of the AES-GCM authentication tag carried in `Envelope::tag`.
pub const TAG_LEN: usize = 16;

/// Length of the symmetric session key.
pub const SESSION_KEY_LEN: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("unexpected event: expected {expected}, got {got}")]
    UnexpectedEvent {
        expected: &'static str,
        got: &'static str,
    },
}
