//! The reader-side inverse of [`crate::print`]: envelope → EEK → entry → pages → content
//! (spec §4.6 "Inverse pipeline").

use libri_crypto::{mac, Eek, Identity, Kek};
use libri_document::entry::EntryContents;
use libri_document::{Document, Entry, Envelope};

use crate::compress;
use crate::encrypt;
use crate::metadata::EntryMetadata;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("envelope is not addressed to this reader")]
    WrongReader,
    #[error("uncompressed size mismatch: metadata said {expected}, got {actual}")]
    SizeMismatch { expected: u64, actual: u64 },
    #[error("uncompressed content MAC mismatch")]
    ContentMacMismatch,
    #[error(transparent)]
    Crypto(#[from] anyhow::Error),
}

/// Supplies documents by content-addressed key; fetching itself (network, disk) is out of
/// scope here (spec §1), so the pipeline only needs this narrow capability.
pub trait DocumentSource {
    fn fetch(&self, key: &libri_core::Id) -> Option<Document>;
}

/// Acquires and decrypts an Entry's full content, given its Envelope.
pub fn scan(source: &dyn DocumentSource, envelope: &Envelope, reader: &Identity) -> Result<Vec<u8>, ScanError> {
    if envelope.reader_pub_key != reader.public_key_bytes() {
        return Err(ScanError::WrongReader);
    }

    let kek = Kek::derive(reader, &envelope.author_pub_key).map_err(|e| ScanError::Crypto(e.into()))?;
    mac::verify(&kek.hmac_key, &envelope.eek_ciphertext, &envelope.eek_ciphertext_mac).map_err(|e| ScanError::Crypto(e.into()))?;
    let eek = Eek::decrypt_from(&kek, &envelope.eek_ciphertext).map_err(|e| ScanError::Crypto(e.into()))?;

    let entry_doc = source.fetch(&envelope.entry_key).ok_or_else(|| ScanError::Crypto(anyhow::anyhow!("entry not found")))?;
    let entry: Entry = entry_doc.as_entry().cloned().ok_or_else(|| ScanError::Crypto(anyhow::anyhow!("entry_key did not resolve to an Entry")))?;

    let metadata_plain = encrypt::decrypt_metadata(&eek, &entry.metadata_ciphertext, &entry.metadata_ciphertext_mac).map_err(ScanError::Crypto)?;
    let metadata: EntryMetadata = bincode::deserialize(&metadata_plain).map_err(|e| ScanError::Crypto(e.into()))?;

    let compressed = match &entry.contents {
        EntryContents::SinglePage(page) => decrypt_one_page(&eek, page)?,
        EntryContents::PageKeys(keys) => {
            let mut out = Vec::new();
            for (i, key) in keys.iter().enumerate() {
                let doc = source.fetch(key).ok_or_else(|| ScanError::Crypto(anyhow::anyhow!("page {i} not found")))?;
                let page = doc.as_page().cloned().ok_or_else(|| ScanError::Crypto(anyhow::anyhow!("page key did not resolve to a Page")))?;
                out.extend(decrypt_one_page(&eek, &page)?);
            }
            out
        }
    };

    if compressed.len() as u64 != metadata.ciphertext_size {
        return Err(ScanError::SizeMismatch { expected: metadata.ciphertext_size, actual: compressed.len() as u64 });
    }

    let content = compress::decompress(metadata.compression_codec.clone().into(), &compressed).map_err(ScanError::Crypto)?;

    if content.len() as u64 != metadata.uncompressed_size {
        return Err(ScanError::SizeMismatch { expected: metadata.uncompressed_size, actual: content.len() as u64 });
    }
    let actual_mac = mac::tag(&eek.hmac_key, &content);
    if actual_mac != metadata.uncompressed_mac {
        return Err(ScanError::ContentMacMismatch);
    }

    Ok(content)
}

fn decrypt_one_page(eek: &Eek, page: &libri_document::Page) -> Result<Vec<u8>, ScanError> {
    encrypt::decrypt_page(eek, page.index, &page.ciphertext, &page.ciphertext_mac).map_err(ScanError::Crypto)
}
