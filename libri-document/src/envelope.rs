//! Per-reader-encrypted EEK binding an Entry key to author and reader public keys (spec C9).

use serde::{Deserialize, Serialize};
use serde_big_array::BigArray;

use libri_core::Id;
use libri_crypto::EEK_CIPHERTEXT_LEN;

use crate::MAC_LEN;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub entry_key: Id,
    #[serde(with = "BigArray")]
    pub author_pub_key: [u8; 33],
    #[serde(with = "BigArray")]
    pub reader_pub_key: [u8; 33],
    #[serde(with = "BigArray")]
    pub eek_ciphertext: [u8; EEK_CIPHERTEXT_LEN],
    pub eek_ciphertext_mac: [u8; MAC_LEN],
}
