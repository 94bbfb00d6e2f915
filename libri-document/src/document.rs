//! The `Document` sum type and its content-addressed key (spec C9, §8 invariant 5).

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use libri_core::Id;

use crate::entry::Entry;
use crate::envelope::Envelope;
use crate::page::Page;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Document {
    Page(Page),
    Entry(Entry),
    Envelope(Envelope),
}

impl Document {
    /// The document's key: SHA-256 of its canonical serialization. Canonical here means
    /// `bincode`'s fixed-width, field-order encoding, so the same value always serializes
    /// to the same bytes.
    pub fn key(&self) -> Id {
        let bytes = bincode::serialize(self).expect("Document serialization is infallible");
        let digest = Sha256::digest(&bytes);
        Id::from_slice(&digest).expect("SHA-256 output is exactly 32 bytes")
    }

    pub fn as_page(&self) -> Option<&Page> {
        match self {
            Document::Page(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_entry(&self) -> Option<&Entry> {
        match self {
            Document::Entry(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_envelope(&self) -> Option<&Envelope> {
        match self {
            Document::Envelope(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::EntryContents;

    fn sample_page() -> Page {
        Page::new([7u8; 33], 0, vec![1, 2, 3, 4], [9u8; 32])
    }

    #[test]
    fn key_is_deterministic_across_calls() {
        let doc = Document::Page(sample_page());
        assert_eq!(doc.key(), doc.key());
    }

    #[test]
    fn differing_documents_produce_differing_keys() {
        let a = Document::Page(sample_page());
        let mut other = sample_page();
        other.index = 1;
        let b = Document::Page(other);
        assert_ne!(a.key(), b.key());
    }

    #[test]
    fn entry_with_page_keys_has_a_stable_key_independent_of_page_order_encoding() {
        let entry = Entry {
            author_pub_key: [1u8; 33],
            created_time_unix: 0,
            metadata_ciphertext: vec![0u8; 16],
            metadata_ciphertext_mac: [0u8; 32],
            contents: EntryContents::PageKeys(vec![Id::from_bytes([1u8; 32]), Id::from_bytes([2u8; 32])]),
        };
        let doc = Document::Entry(entry);
        assert_eq!(doc.key(), doc.key());
    }
}
