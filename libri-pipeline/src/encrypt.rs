//! Per-page and metadata encryption under an Entry's EEK (spec §4.6 step 3).

use libri_crypto::{mac, symmetric, Eek};

/// AAD is the page index, little-endian (spec §4.6: "AAD = page index").
fn page_aad(index: u32) -> [u8; 4] {
    index.to_le_bytes()
}

/// Encrypts page `index`'s plaintext, returning (ciphertext‖tag, HMAC-SHA256 over it).
pub fn encrypt_page(eek: &Eek, index: u32, plaintext: &[u8]) -> anyhow::Result<(Vec<u8>, [u8; mac::HMAC_LEN])> {
    let iv = eek.page_iv(index);
    let ciphertext = symmetric::encrypt(&eek.aes_key, &iv, &page_aad(index), plaintext)?;
    let ciphertext_mac = mac::tag(&eek.hmac_key, &ciphertext);
    Ok((ciphertext, ciphertext_mac))
}

pub fn decrypt_page(eek: &Eek, index: u32, ciphertext: &[u8], ciphertext_mac: &[u8; mac::HMAC_LEN]) -> anyhow::Result<Vec<u8>> {
    mac::verify(&eek.hmac_key, ciphertext, ciphertext_mac).map_err(anyhow::Error::from)?;
    let iv = eek.page_iv(index);
    let plaintext = symmetric::decrypt(&eek.aes_key, &iv, &page_aad(index), ciphertext)?;
    Ok(plaintext)
}

/// Encrypts the Entry's metadata under the EEK's fixed metadata IV (no per-call AAD: the
/// metadata is bound to exactly one Entry).
pub fn encrypt_metadata(eek: &Eek, plaintext: &[u8]) -> anyhow::Result<(Vec<u8>, [u8; mac::HMAC_LEN])> {
    let ciphertext = symmetric::encrypt(&eek.aes_key, &eek.metadata_iv, &[], plaintext)?;
    let ciphertext_mac = mac::tag(&eek.hmac_key, &ciphertext);
    Ok((ciphertext, ciphertext_mac))
}

pub fn decrypt_metadata(eek: &Eek, ciphertext: &[u8], ciphertext_mac: &[u8; mac::HMAC_LEN]) -> anyhow::Result<Vec<u8>> {
    mac::verify(&eek.hmac_key, ciphertext, ciphertext_mac).map_err(anyhow::Error::from)?;
    symmetric::decrypt(&eek.aes_key, &eek.metadata_iv, &[], ciphertext).map_err(anyhow::Error::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_round_trips() {
        let eek = Eek::generate();
        let (ciphertext, mac) = encrypt_page(&eek, 3, b"hello page").unwrap();
        let plaintext = decrypt_page(&eek, 3, &ciphertext, &mac).unwrap();
        assert_eq!(plaintext, b"hello page");
    }

    #[test]
    fn tampered_ciphertext_fails_mac_check() {
        let eek = Eek::generate();
        let (mut ciphertext, mac) = encrypt_page(&eek, 0, b"data").unwrap();
        ciphertext[0] ^= 0xff;
        assert!(decrypt_page(&eek, 0, &ciphertext, &mac).is_err());
    }

    #[test]
    fn wrong_page_index_fails_to_decrypt() {
        let eek = Eek::generate();
        let (ciphertext, mac) = encrypt_page(&eek, 0, b"data").unwrap();
        assert!(decrypt_page(&eek, 1, &ciphertext, &mac).is_err());
    }

    #[test]
    fn metadata_round_trips() {
        let eek = Eek::generate();
        let (ciphertext, mac) = encrypt_metadata(&eek, b"{\"media_type\":\"application/x-pdf\"}").unwrap();
        let plaintext = decrypt_metadata(&eek, &ciphertext, &mac).unwrap();
        assert_eq!(plaintext, b"{\"media_type\":\"application/x-pdf\"}");
    }
}
