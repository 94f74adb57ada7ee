use std::time::Duration;

use thiserror::Error;
use veil_core::{FrameError, WireError};
use veil_crypto::CryptoError;

/// Secure channel errors. All of them end the session.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("framing error: {0}")]
    Frame(#[from] FrameError),

    #[error("wire error: {0}")]
    Wire(#[from] WireError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("peer closed the connection")]
    Closed,

    #[error("handshake timed out after {0:?}")]
    HandshakeTimeout(Duration),
}

impl From<ChannelError> for veil_common::Error {
    fn from(err: ChannelError) -> Self {
        match err {
            ChannelError::Io(e) => Self::Io(e),
            ChannelError::Crypto(e) => Self::Crypto(e),
            ChannelError::HandshakeTimeout(d) => Self::timeout(format!("handshake after {d:?}")),
            other => Self::protocol(other),
        }
    }
}
