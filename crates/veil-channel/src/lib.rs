//! Async secure channel over any byte stream.
//!
//! Ties together the pieces from the other Veil crates:
//!
//! 1. Framing (`veil_core::framing`) to delimit JSON messages on the stream
//! 2. The DH handshake (`veil_crypto::Handshake`) to derive a session key
//! 3. AES-256-GCM envelopes (`veil_crypto::{seal, open}`) for every message
//!
//! The channel is strictly sequential: one handshake, then any number of
//! `send` / `recv` calls. Every error is fatal for the session; the caller
//! drops the channel and with it the session key.

#![forbid(unsafe_code)]

pub mod channel;
pub mod error;
pub mod framed;

pub use channel::SecureChannel;
pub use error::ChannelError;
pub use framed::FramedStream;
pub use veil_crypto::Role;
