//! Field-length and structural validation for documents, grounded on the source's
//! `ValidateDocument`/`ValidatePage`/`ValidateEntry`/`ValidateEnvelope` family.

use libri_core::error::ProtocolError;
use libri_crypto::EEK_CIPHERTEXT_LEN;

use crate::document::Document;
use crate::entry::EntryContents;
use crate::envelope::Envelope;
use crate::{MAC_LEN, PUBLIC_KEY_LEN};

type Result<T> = std::result::Result<T, ProtocolError>;

fn validate_not_all_zero(field: &str, bytes: &[u8]) -> Result<()> {
    if bytes.iter().all(|b| *b == 0) {
        return Err(ProtocolError::ValidationFailed(field.to_string()));
    }
    Ok(())
}

pub fn validate_public_key(field: &str, key: &[u8; PUBLIC_KEY_LEN]) -> Result<()> {
    validate_not_all_zero(field, key)
}

pub fn validate_mac(field: &str, mac: &[u8; MAC_LEN]) -> Result<()> {
    validate_not_all_zero(field, mac)
}

pub fn validate_document(doc: &Document) -> Result<()> {
    match doc {
        Document::Page(p) => validate_public_key("page.author_pub_key", &p.author_pub_key)
            .and_then(|_| validate_mac("page.ciphertext_mac", &p.ciphertext_mac))
            .and_then(|_| validate_not_all_zero("page.ciphertext", &p.ciphertext)),
        Document::Entry(e) => {
            validate_public_key("entry.author_pub_key", &e.author_pub_key)?;
            validate_mac("entry.metadata_ciphertext_mac", &e.metadata_ciphertext_mac)?;
            validate_not_all_zero("entry.metadata_ciphertext", &e.metadata_ciphertext)?;
            match &e.contents {
                EntryContents::SinglePage(page) => {
                    if page.author_pub_key != e.author_pub_key {
                        return Err(ProtocolError::ValidationFailed("entry.contents.author_pub_key".into()));
                    }
                    validate_document(&Document::Page(page.clone()))
                }
                EntryContents::PageKeys(keys) => {
                    if keys.is_empty() {
                        return Err(ProtocolError::ValidationFailed("entry.contents.page_keys".into()));
                    }
                    Ok(())
                }
            }
        }
        Document::Envelope(env) => validate_envelope(env),
    }
}

pub fn validate_envelope(env: &Envelope) -> Result<()> {
    validate_public_key("envelope.author_pub_key", &env.author_pub_key)?;
    validate_public_key("envelope.reader_pub_key", &env.reader_pub_key)?;
    validate_mac("envelope.eek_ciphertext_mac", &env.eek_ciphertext_mac)?;
    if env.eek_ciphertext.len() != EEK_CIPHERTEXT_LEN {
        return Err(ProtocolError::ValidationFailed("envelope.eek_ciphertext".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::Page;

    #[test]
    fn all_zero_public_key_is_rejected() {
        let page = Page::new([0u8; 33], 0, vec![1], [1u8; 32]);
        assert!(validate_document(&Document::Page(page)).is_err());
    }

    #[test]
    fn well_formed_page_passes() {
        let page = Page::new([7u8; 33], 0, vec![1, 2, 3], [9u8; 32]);
        assert!(validate_document(&Document::Page(page)).is_ok());
    }

    #[test]
    fn empty_page_keys_list_is_rejected() {
        let entry = crate::entry::Entry {
            author_pub_key: [5u8; 33],
            created_time_unix: 0,
            metadata_ciphertext: vec![1, 2],
            metadata_ciphertext_mac: [3u8; 32],
            contents: EntryContents::PageKeys(vec![]),
        };
        assert!(validate_document(&Document::Entry(entry)).is_err());
    }
}
