//! Ephemeral DH key pairs, shared secrets and session keys.
//!
//! ```text
//! KeyPair::generate(group)          x <- [2, q-1],  y = g^x mod p
//! compute_shared_secret(peer_y)     z = peer_y^x mod p   (padded to |p|)
//! derive_session_key(z)             HKDF-SHA256(salt = "", info = "", L = 32)
//! ```
//!
//! Private exponents, shared secrets and session keys are zeroized on drop
//! and redacted from `Debug` output.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hkdf::Hkdf;
use num_bigint::{BigUint, RandBigInt};
use rand::rngs::OsRng;
use sha2::Sha256;
use veil_core::SESSION_KEY_LEN;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::{CryptoError, Result};
use crate::group::GroupParams;

/// Ephemeral DH key pair for a single session.
pub struct KeyPair {
    /// Big-endian private exponent.
    private: Zeroizing<Vec<u8>>,
    public: BigUint,
}

impl KeyPair {
    /// Sample a private exponent uniformly from `[2, q-1]` and compute the
    /// public value.
    pub fn generate(group: &GroupParams) -> Result<Self> {
        let two = BigUint::from(2u32);
        if group.order() <= &two {
            return Err(CryptoError::parameter("subgroup order too small"));
        }

        let x = OsRng.gen_biguint_range(&two, group.order());
        let public = group.generator().modpow(&x, group.prime());

        Ok(Self {
            private: Zeroizing::new(x.to_bytes_be()),
            public,
        })
    }

    pub fn public(&self) -> &BigUint {
        &self.public
    }

    /// Public value in its transport encoding.
    pub fn public_base64(&self) -> String {
        encode_public_value(&self.public)
    }

    /// Compute `peer_public^x mod p`, after checking that the peer value is a
    /// non-trivial element of the subgroup.
    pub fn compute_shared_secret(
        &self,
        peer_public: &BigUint,
        group: &GroupParams,
    ) -> Result<SharedSecret> {
        if !group.is_valid_public(peer_public) {
            return Err(CryptoError::InvalidPeerKey);
        }

        let x = BigUint::from_bytes_be(&self.private);
        let z = peer_public.modpow(&x, group.prime());
        let raw = Zeroizing::new(z.to_bytes_be());

        let mut padded = Zeroizing::new(vec![0u8; group.byte_len()]);
        let offset = padded.len() - raw.len();
        padded[offset..].copy_from_slice(&raw);

        Ok(SharedSecret(padded))
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public_base64())
            .finish_non_exhaustive()
    }
}

/// Raw DH output, big-endian and fixed-width.
pub struct SharedSecret(Zeroizing<Vec<u8>>);

impl SharedSecret {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(Zeroizing::new(bytes.to_vec()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SharedSecret({} bytes)", self.0.len())
    }
}

/// 32-byte symmetric key shared by both peers for one session.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SessionKey([u8; SESSION_KEY_LEN]);

impl SessionKey {
    pub fn from_bytes(bytes: [u8; SESSION_KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SESSION_KEY_LEN] {
        &self.0
    }
}

impl PartialEq for SessionKey {
    fn eq(&self, other: &Self) -> bool {
        constant_time_eq(&self.0, &other.0)
    }
}

impl Eq for SessionKey {}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionKey(..)")
    }
}

/// HKDF-SHA256 with empty salt and empty info, 32-byte output.
pub fn derive_session_key(secret: &SharedSecret) -> SessionKey {
    let hk = Hkdf::<Sha256>::new(None, secret.as_bytes());
    let mut okm = [0u8; SESSION_KEY_LEN];
    // 32 bytes is far below the 255 * HashLen expand limit.
    hk.expand(&[], &mut okm)
        .expect("32-byte HKDF-SHA256 output is always valid");
    let key = SessionKey(okm);
    okm.zeroize();
    key
}

/// Minimal big-endian bytes of `value`, base64-encoded.
pub fn encode_public_value(value: &BigUint) -> String {
    STANDARD.encode(value.to_bytes_be())
}

/// Inverse of [`encode_public_value`]. Range checks happen in
/// [`KeyPair::compute_shared_secret`].
pub fn decode_public_value(encoded: &str) -> Result<BigUint> {
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|e| CryptoError::decode(format!("public key is not valid base64: {e}")))?;

    if bytes.is_empty() {
        return Err(CryptoError::decode("public key is empty"));
    }

    Ok(BigUint::from_bytes_be(&bytes))
}

/// Compare two byte strings without an early exit on the first mismatch.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut diff = 0u8;
    for (lhs, rhs) in a.iter().zip(b.iter()) {
        diff |= lhs ^ rhs;
    }
    diff == 0
}
