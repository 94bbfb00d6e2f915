//! EEK (entry encryption key) and KEK (key-encryption key) bundles (spec §3).

use zeroize::Zeroize;

use crate::ecdh;
use crate::error::{CryptoError, Result};
use crate::identity::Identity;
use crate::kdf;
use crate::symmetric;

pub const EEK_LEN: usize = 92;
pub const KEK_LEN: usize = 76;
/// `EEK_LEN` plaintext + one GCM tag: the `Envelope.eek_ciphertext` wire length.
pub const EEK_CIPHERTEXT_LEN: usize = EEK_LEN + symmetric::TAG_LEN;

const KEK_INFO: &[u8] = b"libri-kek";

/// AES-256 key (32) + page-IV-seed (16) + HMAC key (32) + metadata IV (12) = 92 bytes.
/// Generated once per Entry and never reused across entries.
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct Eek {
    pub aes_key: [u8; 32],
    pub page_iv_seed: [u8; 16],
    pub hmac_key: [u8; 32],
    pub metadata_iv: [u8; 12],
}

impl Eek {
    pub fn generate() -> Self {
        use rand::RngCore;
        let mut rng = rand::rngs::OsRng;
        let mut aes_key = [0u8; 32];
        let mut page_iv_seed = [0u8; 16];
        let mut hmac_key = [0u8; 32];
        let mut metadata_iv = [0u8; 12];
        rng.fill_bytes(&mut aes_key);
        rng.fill_bytes(&mut page_iv_seed);
        rng.fill_bytes(&mut hmac_key);
        rng.fill_bytes(&mut metadata_iv);
        Self { aes_key, page_iv_seed, hmac_key, metadata_iv }
    }

    pub fn to_bytes(&self) -> [u8; EEK_LEN] {
        let mut out = [0u8; EEK_LEN];
        out[0..32].copy_from_slice(&self.aes_key);
        out[32..48].copy_from_slice(&self.page_iv_seed);
        out[48..80].copy_from_slice(&self.hmac_key);
        out[80..92].copy_from_slice(&self.metadata_iv);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != EEK_LEN {
            return Err(CryptoError::InvalidKeyLength { expected: EEK_LEN, found: bytes.len() });
        }
        let mut aes_key = [0u8; 32];
        let mut page_iv_seed = [0u8; 16];
        let mut hmac_key = [0u8; 32];
        let mut metadata_iv = [0u8; 12];
        aes_key.copy_from_slice(&bytes[0..32]);
        page_iv_seed.copy_from_slice(&bytes[32..48]);
        hmac_key.copy_from_slice(&bytes[48..80]);
        metadata_iv.copy_from_slice(&bytes[80..92]);
        Ok(Self { aes_key, page_iv_seed, hmac_key, metadata_iv })
    }

    /// Per-page IV = first 12 bytes of HMAC-SHA256(page_iv_seed, LE u32(page_index)).
    pub fn page_iv(&self, page_index: u32) -> [u8; symmetric::IV_LEN] {
        let tag = crate::mac::tag(&self.page_iv_seed, &page_index.to_le_bytes());
        let mut iv = [0u8; symmetric::IV_LEN];
        iv.copy_from_slice(&tag[..symmetric::IV_LEN]);
        iv
    }

    /// Encrypts this EEK under `kek`, producing the envelope's `eek_ciphertext` field.
    pub fn encrypt_under(&self, kek: &Kek) -> Result<[u8; EEK_CIPHERTEXT_LEN]> {
        let ciphertext = symmetric::encrypt(&kek.aes_key, &kek.iv, &[], &self.to_bytes())?;
        let mut out = [0u8; EEK_CIPHERTEXT_LEN];
        out.copy_from_slice(&ciphertext);
        Ok(out)
    }

    /// Decrypts an envelope's `eek_ciphertext` field under `kek`.
    pub fn decrypt_from(kek: &Kek, ciphertext: &[u8]) -> Result<Self> {
        let plaintext = symmetric::decrypt(&kek.aes_key, &kek.iv, &[], ciphertext)?;
        Self::from_bytes(&plaintext)
    }
}

/// AES-256 key (32) + EEK IV (12) + HMAC key (32) = 76 bytes, derived via HKDF-SHA256 from
/// ECDH(author_priv, reader_pub). Never persisted.
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct Kek {
    pub aes_key: [u8; 32],
    pub iv: [u8; 12],
    pub hmac_key: [u8; 32],
}

impl Kek {
    pub fn derive(local: &Identity, remote_compressed_pub_key: &[u8]) -> Result<Self> {
        let shared = ecdh::shared_secret(local, remote_compressed_pub_key)?;
        let bytes = kdf::derive(None, &shared, KEK_INFO, KEK_LEN)?;
        Self::from_bytes(&bytes)
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != KEK_LEN {
            return Err(CryptoError::InvalidKeyLength { expected: KEK_LEN, found: bytes.len() });
        }
        let mut aes_key = [0u8; 32];
        let mut iv = [0u8; 12];
        let mut hmac_key = [0u8; 32];
        aes_key.copy_from_slice(&bytes[0..32]);
        iv.copy_from_slice(&bytes[32..44]);
        hmac_key.copy_from_slice(&bytes[44..76]);
        Ok(Self { aes_key, iv, hmac_key })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eek_round_trips_bytes() {
        let eek = Eek::generate();
        let back = Eek::from_bytes(&eek.to_bytes()).unwrap();
        assert_eq!(eek.to_bytes(), back.to_bytes());
    }

    #[test]
    fn page_iv_differs_by_index() {
        let eek = Eek::generate();
        assert_ne!(eek.page_iv(0), eek.page_iv(1));
    }

    #[test]
    fn kek_derivation_is_symmetric_between_author_and_reader() {
        let author = Identity::generate();
        let reader = Identity::generate();
        let kek_a = Kek::derive(&author, &reader.public_key_bytes()).unwrap();
        let kek_b = Kek::derive(&reader, &author.public_key_bytes()).unwrap();
        assert_eq!(kek_a.aes_key, kek_b.aes_key);
        assert_eq!(kek_a.iv, kek_b.iv);
        assert_eq!(kek_a.hmac_key, kek_b.hmac_key);
    }

    #[test]
    fn eek_round_trips_through_envelope_encryption() {
        let author = Identity::generate();
        let reader = Identity::generate();
        let kek = Kek::derive(&author, &reader.public_key_bytes()).unwrap();
        let eek = Eek::generate();
        let ciphertext = eek.encrypt_under(&kek).unwrap();
        assert_eq!(ciphertext.len(), EEK_CIPHERTEXT_LEN);

        let reader_kek = Kek::derive(&reader, &author.public_key_bytes()).unwrap();
        let decrypted = Eek::decrypt_from(&reader_kek, &ciphertext).unwrap();
        assert_eq!(decrypted.to_bytes(), eek.to_bytes());
    }
}
