//! Secure channel establishment and encrypted transport.
//!
//! # Wire Format
//!
//! Each frame carries one JSON object:
//!
//! ```text
//! initiator -> responder   {"event":"handshake","publicKey":...}
//! responder -> initiator   {"event":"handshake","publicKey":...}
//! either direction         {"event":"message","payload":{"iv":...,"tag":...,"ciphertext":...}}
//! ```
//!
//! The responder validates the initiator's public value before sending its
//! own, so a malformed or degenerate handshake gets no reply.

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info};
use veil_common::ChannelConfig;
use veil_core::WireMessage;
use veil_crypto::{open, seal, CryptoError, Handshake, Role, SessionKey};

use crate::error::ChannelError;
use crate::framed::FramedStream;

/// An established session: framed stream plus the derived session key.
pub struct SecureChannel<S> {
    framed: FramedStream<S>,
    key: SessionKey,
    role: Role,
}

impl<S> SecureChannel<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Run the handshake over `stream` and return the established channel.
    ///
    /// Bounded by `config.handshake_timeout` when set.
    pub async fn establish(
        stream: S,
        role: Role,
        config: &ChannelConfig,
    ) -> Result<Self, ChannelError> {
        let framed = FramedStream::new(stream, config.framing, config.max_frame_len);
        let handshake = Self::handshake(framed, role, config);

        match config.handshake_timeout {
            Some(limit) => tokio::time::timeout(limit, handshake)
                .await
                .map_err(|_| ChannelError::HandshakeTimeout(limit))?,
            None => handshake.await,
        }
    }

    async fn handshake(
        mut framed: FramedStream<S>,
        role: Role,
        config: &ChannelConfig,
    ) -> Result<Self, ChannelError> {
        let handshake = Handshake::new(&config.group, role)?;
        let ours = handshake.message().to_json()?;

        let key = if role.sends_first() {
            framed.write_frame(&ours).await?;
            debug!("handshake sent, waiting for peer");
            let peer = framed.read_frame().await?;
            handshake.finish_json(&peer)?
        } else {
            let peer = framed.read_frame().await?;
            let key = handshake.finish_json(&peer)?;
            framed.write_frame(&ours).await?;
            key
        };

        info!(
            ?role,
            group = config.group.name(),
            framing = %config.framing,
            "secure channel established"
        );

        Ok(Self { framed, key, role })
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Seal `plaintext` and send it as one application message.
    pub async fn send(&mut self, plaintext: &[u8]) -> Result<(), ChannelError> {
        let payload = seal(&self.key, plaintext)?;
        let json = WireMessage::Message { payload }.to_json()?;
        self.framed.write_frame(&json).await
    }

    /// Receive one application message and return its verified plaintext.
    pub async fn recv(&mut self) -> Result<Vec<u8>, ChannelError> {
        let frame = self.framed.read_frame().await?;
        let envelope = WireMessage::from_json(&frame)
            .and_then(WireMessage::into_envelope)
            .map_err(CryptoError::from)?;
        let plaintext = open(&self.key, &envelope)?;
        debug!("received message ({} bytes)", plaintext.len());
        Ok(plaintext)
    }

    /// Tear down the session, dropping the key, and return the stream.
    pub fn into_inner(self) -> S {
        self.framed.into_inner()
    }
}
