//! ECDH key agreement over P-256, the author/reader shared secret behind KEK derivation.

use p256::ecdh::diffie_hellman;
use p256::PublicKey;

use crate::error::{CryptoError, Result};
use crate::identity::Identity;

/// Performs ECDH(author_priv, reader_pub) and returns the raw shared-secret bytes, ready
/// to be fed into HKDF as input key material. The caller never persists this value.
pub fn shared_secret(local: &Identity, remote_compressed_pub_key: &[u8]) -> Result<[u8; 32]> {
    let remote = PublicKey::from_sec1_bytes(remote_compressed_pub_key)
        .map_err(|_| CryptoError::InvalidKeyLength {
            expected: 33,
            found: remote_compressed_pub_key.len(),
        })?;
    let shared = diffie_hellman(local.secret_key().to_nonzero_scalar(), remote.as_affine());
    let mut out = [0u8; 32];
    out.copy_from_slice(shared.raw_secret_bytes().as_slice());
    Ok(out)
}
