//! AES-256-GCM encryption with caller-supplied (deterministic) IVs.
//!
//! Unlike a general-purpose AEAD helper that generates and prepends a random nonce, the
//! page pipeline needs a specific IV per page derived from the page index (spec C8), so
//! the IV is always an explicit argument here rather than sampled internally.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Key, Nonce};

use crate::error::{CryptoError, Result};

pub const KEY_LEN: usize = 32;
pub const IV_LEN: usize = 12;
pub const TAG_LEN: usize = 16;

fn cipher(key: &[u8]) -> Result<Aes256Gcm> {
    if key.len() != KEY_LEN {
        return Err(CryptoError::InvalidKeyLength { expected: KEY_LEN, found: key.len() });
    }
    Ok(Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key)))
}

/// Encrypts `plaintext` under `key`/`iv` with associated data `aad`. Returns
/// ciphertext ‖ tag, the wire layout the spec's `Page.ciphertext` field uses.
pub fn encrypt(key: &[u8], iv: &[u8; IV_LEN], aad: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = cipher(key)?;
    let nonce = Nonce::from_slice(iv);
    cipher
        .encrypt(nonce, Payload { msg: plaintext, aad })
        .map_err(|_| CryptoError::DecryptionFailed)
}

/// Decrypts a ciphertext‖tag blob produced by [`encrypt`].
pub fn decrypt(key: &[u8], iv: &[u8; IV_LEN], aad: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
    let cipher = cipher(key)?;
    let nonce = Nonce::from_slice(iv);
    cipher
        .decrypt(nonce, Payload { msg: ciphertext, aad })
        .map_err(|_| CryptoError::DecryptionFailed)
}
