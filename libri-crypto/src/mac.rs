//! HMAC-SHA256 tagging and constant-time verification.

use hmac::{Hmac, Mac as HmacMac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::{CryptoError, Result};

pub const HMAC_LEN: usize = 32;

type HmacSha256 = Hmac<Sha256>;

/// Computes HMAC-SHA256(key, message).
pub fn tag(key: &[u8], message: &[u8]) -> [u8; HMAC_LEN] {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(message);
    let result = mac.finalize().into_bytes();
    let mut out = [0u8; HMAC_LEN];
    out.copy_from_slice(&result);
    out
}

/// Verifies `expected` against a freshly computed tag, in constant time.
pub fn verify(key: &[u8], message: &[u8], expected: &[u8]) -> Result<()> {
    if expected.len() != HMAC_LEN {
        return Err(CryptoError::InvalidKeyLength { expected: HMAC_LEN, found: expected.len() });
    }
    let computed = tag(key, message);
    if computed.ct_eq(expected).into() {
        Ok(())
    } else {
        Err(CryptoError::MacMismatch)
    }
}
