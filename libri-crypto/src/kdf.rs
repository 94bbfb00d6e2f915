//! HKDF-SHA256 key derivation, used to expand an ECDH shared secret into a KEK.

use hkdf::Hkdf;
use sha2::Sha256;

use crate::error::{CryptoError, Result};

/// Expands `ikm` (input key material) with `salt` and `info` into `output_len` bytes.
pub fn derive(salt: Option<&[u8]>, ikm: &[u8], info: &[u8], output_len: usize) -> Result<Vec<u8>> {
    let hk = Hkdf::<Sha256>::new(salt, ikm);
    let mut output = vec![0u8; output_len];
    hk.expand(info, &mut output)
        .map_err(|e| CryptoError::DerivationFailed(e.to_string()))?;
    Ok(output)
}
