//! Session handshake.
//!
//! # Handshake Flow
//!
//! ```text
//! Initiator (Client)                    Responder (Server)
//!     |                                       |
//!     |  {"event":"handshake","publicKey":A}  |
//!     |-------------------------------------->|
//!     |                                       |
//!     |  {"event":"handshake","publicKey":B}  |
//!     |<--------------------------------------|
//!     |                                       |
//!     [  both: K = HKDF(peer^own mod p)       ]
//! ```
//!
//! There is no acknowledgment and no identity check: each side sends one
//! ephemeral public value and derives the key from what it receives.
//! A `Handshake` owns the ephemeral key pair; `finish` consumes it, so the
//! private exponent and raw shared secret are dropped (and zeroized) as
//! soon as the session key exists.

use tracing::debug;
use veil_core::WireMessage;

use crate::error::Result;
use crate::group::GroupParams;
use crate::keys::{decode_public_value, derive_session_key, KeyPair, SessionKey};

/// Which side of the exchange this peer plays. Only ordering differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Sends its handshake first, then waits for the peer's.
    Initiator,
    /// Waits for the peer's handshake, then replies with its own.
    Responder,
}

impl Role {
    pub fn sends_first(self) -> bool {
        matches!(self, Role::Initiator)
    }
}

/// One in-flight handshake: group, role and ephemeral key pair.
pub struct Handshake {
    group: GroupParams,
    role: Role,
    keypair: KeyPair,
}

impl Handshake {
    /// Generate a fresh ephemeral key pair in `group`.
    pub fn new(group: &GroupParams, role: Role) -> Result<Self> {
        let keypair = KeyPair::generate(group)?;
        debug!(group = group.name(), ?role, "generated ephemeral key pair");

        Ok(Self {
            group: group.clone(),
            role,
            keypair,
        })
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn group(&self) -> &GroupParams {
        &self.group
    }

    /// Our public value, base64-encoded.
    pub fn public_key(&self) -> String {
        self.keypair.public_base64()
    }

    /// The handshake message to send to the peer.
    pub fn message(&self) -> WireMessage {
        WireMessage::Handshake {
            public_key: self.public_key(),
        }
    }

    /// Complete the handshake from the peer's raw JSON message.
    pub fn finish_json(self, peer_json: &[u8]) -> Result<SessionKey> {
        let message = WireMessage::from_json(peer_json)?;
        self.finish(message)
    }

    /// Complete the handshake from the peer's parsed message.
    pub fn finish(self, peer: WireMessage) -> Result<SessionKey> {
        let public_key = peer.into_handshake()?;
        self.finish_with_public_key(&public_key)
    }

    /// Complete the handshake from the peer's encoded public value.
    pub fn finish_with_public_key(self, peer_public_key: &str) -> Result<SessionKey> {
        let peer_public = decode_public_value(peer_public_key)?;
        let shared = self
            .keypair
            .compute_shared_secret(&peer_public, &self.group)?;
        let key = derive_session_key(&shared);

        debug!(role = ?self.role, "session key derived");
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CryptoError;
    use num_bigint::BigUint;

    fn small_group() -> GroupParams {
        GroupParams::new(BigUint::from(2039u32), BigUint::from(2u32)).unwrap()
    }

    #[test]
    fn test_full_handshake() {
        let group = GroupParams::oakley2();
        let initiator = Handshake::new(&group, Role::Initiator).unwrap();
        let responder = Handshake::new(&group, Role::Responder).unwrap();

        let msg1 = initiator.message().to_json().unwrap();
        let msg2 = responder.message().to_json().unwrap();

        let k_initiator = initiator.finish_json(&msg2).unwrap();
        let k_responder = responder.finish_json(&msg1).unwrap();

        assert_eq!(k_initiator, k_responder);
    }

    #[test]
    fn test_sessions_get_distinct_keys() {
        let group = small_group();
        let run = || {
            let a = Handshake::new(&group, Role::Initiator).unwrap();
            let b = Handshake::new(&group, Role::Responder).unwrap();
            let msg_b = b.message();
            a.finish(msg_b).unwrap()
        };
        // Small group, so collisions are possible but not across many runs.
        let keys: Vec<SessionKey> = (0..8).map(|_| run()).collect();
        assert!(keys.iter().any(|k| k != &keys[0]));
    }

    #[test]
    fn test_role_ordering() {
        assert!(Role::Initiator.sends_first());
        assert!(!Role::Responder.sends_first());
    }

    #[test]
    fn test_malformed_json_is_decode_error() {
        let hs = Handshake::new(&small_group(), Role::Responder).unwrap();
        let err = hs.finish_json(b"{\"event\":\"handshake\",").unwrap_err();
        assert!(matches!(err, CryptoError::Decode(_)));
    }

    #[test]
    fn test_bad_base64_is_decode_error() {
        let hs = Handshake::new(&small_group(), Role::Responder).unwrap();
        let err = hs
            .finish_json(br#"{"event":"handshake","publicKey":"%%%"}"#)
            .unwrap_err();
        assert!(matches!(err, CryptoError::Decode(_)));
    }

    #[test]
    fn test_wrong_event_is_decode_error() {
        let hs = Handshake::new(&small_group(), Role::Initiator).unwrap();
        let raw = br#"{"event":"message","payload":{"iv":"","tag":"","ciphertext":""}}"#;
        let err = hs.finish_json(raw).unwrap_err();
        assert!(matches!(err, CryptoError::Decode(_)));
    }

    #[test]
    fn test_degenerate_peer_rejected() {
        let group = small_group();
        // "AQ==" is 1, "B/Y=" is 2038 = p - 1.
        for encoded in ["AA==", "AQ==", "B/Y="] {
            let hs = Handshake::new(&group, Role::Initiator).unwrap();
            let err = hs.finish_with_public_key(encoded).unwrap_err();
            assert!(matches!(err, CryptoError::InvalidPeerKey), "{encoded}");
        }
    }
}
