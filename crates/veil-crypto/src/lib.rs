//! Cryptographic core for Veil.
//!
//! This crate provides:
//! - Finite-field DH group parameters (RFC 3526 MODP 14 by default)
//! - Ephemeral key pairs, peer-value validation and shared-secret derivation
//! - HKDF-SHA256 session key derivation
//! - AES-256-GCM envelopes for application messages
//!
//! # Design
//!
//! The handshake is an unauthenticated ephemeral DH exchange: each peer
//! sends one public value and derives
//! `K = HKDF-SHA256(salt = "", ikm = peer^own mod p, info = "")`.
//! No identity is verified, so an active man-in-the-middle is out of scope.
//!
//! The envelope codec only depends on the resulting `SessionKey` and can be
//! used on its own.

#![forbid(unsafe_code)]

pub mod envelope;
pub mod error;
pub mod group;
pub mod handshake;
pub mod keys;

pub use envelope::{open, seal};
pub use error::{CryptoError, Result};
pub use group::GroupParams;
pub use handshake::{Handshake, Role};
pub use keys::{
    decode_public_value, derive_session_key, encode_public_value, KeyPair, SessionKey,
    SharedSecret,
};
