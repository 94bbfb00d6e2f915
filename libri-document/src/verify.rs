//! Verify RPC proof-of-possession (spec §11 supplement): a peer asked to `Verify` a document
//! it claims to hold answers with an HMAC over a challenge nonce, keyed off the document's
//! own bytes, without re-sending the document itself.

use libri_crypto::{kdf, mac};

use crate::document::Document;

const VERIFY_KEY_INFO: &[u8] = b"libri-verify";
const VERIFY_KEY_LEN: usize = 32;

/// Derives the per-document verification key: HKDF-SHA256(document content, "libri-verify").
fn verification_key(doc: &Document) -> [u8; VERIFY_KEY_LEN] {
    let content = bincode::serialize(doc).expect("Document always serializes");
    let derived = kdf::derive(None, &content, VERIFY_KEY_INFO, VERIFY_KEY_LEN).expect("HKDF expand of 32 bytes never fails");
    let mut key = [0u8; VERIFY_KEY_LEN];
    key.copy_from_slice(&derived);
    key
}

/// Answers a Verify challenge for a document this node actually holds: HMAC(verification
/// key, nonce).
pub fn respond(doc: &Document, nonce: &[u8]) -> [u8; mac::HMAC_LEN] {
    mac::tag(&verification_key(doc), nonce)
}

/// Checks a claimed holder's Verify response against the document the challenger expects.
pub fn check(doc: &Document, nonce: &[u8], response: &[u8]) -> bool {
    mac::verify(&verification_key(doc), nonce, response).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::Page;

    fn sample_doc() -> Document {
        Document::Page(Page::new([7u8; 33], 0, vec![1, 2, 3], [9u8; 32]))
    }

    #[test]
    fn response_verifies_against_the_same_document_and_nonce() {
        let doc = sample_doc();
        let nonce = b"challenge-nonce";
        let response = respond(&doc, nonce);
        assert!(check(&doc, nonce, &response));
    }

    #[test]
    fn response_is_rejected_for_a_different_nonce() {
        let doc = sample_doc();
        let response = respond(&doc, b"nonce-a");
        assert!(!check(&doc, b"nonce-b", &response));
    }

    #[test]
    fn response_is_rejected_for_a_different_document() {
        let doc_a = sample_doc();
        let doc_b = Document::Page(Page::new([8u8; 33], 0, vec![1, 2, 3], [9u8; 32]));
        let response = respond(&doc_a, b"nonce");
        assert!(!check(&doc_b, b"nonce", &response));
    }
}
