//! Entry metadata plus either an inline Page or an ordered list of Page keys (spec C9).

use serde::{Deserialize, Serialize};
use serde_big_array::BigArray;

use crate::page::Page;
use crate::MAC_LEN;
use libri_core::Id;

/// An Entry's content is either small enough to embed directly, or split across
/// separately-stored pages referenced by key, in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryContents {
    SinglePage(Page),
    PageKeys(Vec<Id>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    #[serde(with = "BigArray")]
    pub author_pub_key: [u8; 33],
    pub created_time_unix: i64,
    pub metadata_ciphertext: Vec<u8>,
    pub metadata_ciphertext_mac: [u8; MAC_LEN],
    pub contents: EntryContents,
}

impl Entry {
    /// The author key every Page in this Entry must carry (spec §3 invariant).
    pub fn author_pub_key(&self) -> &[u8; 33] {
        &self.author_pub_key
    }

    pub fn page_keys(&self) -> Option<&[Id]> {
        match &self.contents {
            EntryContents::PageKeys(keys) => Some(keys),
            EntryContents::SinglePage(_) => None,
        }
    }
}
