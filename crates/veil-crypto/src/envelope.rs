//! AES-256-GCM message envelopes.
//!
//! ```text
//! seal:  nonce <- OsRng (12 bytes)
//!        ciphertext || tag = AES-256-GCM(key, nonce, plaintext, aad = "")
//!        Envelope { iv: b64(nonce), tag: b64(tag), ciphertext: b64(ciphertext) }
//! ```
//!
//! Nonces are random per call, so a key can seal many messages without
//! any shared counter. `open` fails closed: either the whole plaintext is
//! returned or an error, never a partial buffer.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use veil_core::{Envelope, NONCE_LEN, TAG_LEN};

use crate::error::{CryptoError, Result};
use crate::keys::SessionKey;

/// Encrypt `plaintext` under `key` with a fresh random nonce.
pub fn seal(key: &SessionKey, plaintext: &[u8]) -> Result<Envelope> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));

    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    let mut sealed = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|_| CryptoError::parameter("plaintext exceeds AES-GCM message limit"))?;

    // aes-gcm appends the tag to the ciphertext.
    let tag = sealed.split_off(sealed.len() - TAG_LEN);

    Ok(Envelope {
        iv: STANDARD.encode(nonce),
        tag: STANDARD.encode(tag),
        ciphertext: STANDARD.encode(sealed),
    })
}

/// Verify and decrypt `envelope` under `key`.
pub fn open(key: &SessionKey, envelope: &Envelope) -> Result<Vec<u8>> {
    let nonce = decode_field("iv", &envelope.iv, Some(NONCE_LEN))?;
    let tag = decode_field("tag", &envelope.tag, Some(TAG_LEN))?;
    let mut sealed = decode_field("ciphertext", &envelope.ciphertext, None)?;
    sealed.extend_from_slice(&tag);

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));
    cipher
        .decrypt(Nonce::from_slice(&nonce), sealed.as_slice())
        .map_err(|_| CryptoError::Authentication)
}

fn decode_field(name: &str, value: &str, expected_len: Option<usize>) -> Result<Vec<u8>> {
    let bytes = STANDARD
        .decode(value)
        .map_err(|e| CryptoError::decode(format!("{name} is not valid base64: {e}")))?;

    match expected_len {
        Some(len) if bytes.len() != len => Err(CryptoError::decode(format!(
            "{name} must be {len} bytes, got {}",
            bytes.len()
        ))),
        _ => Ok(bytes),
    }
}
