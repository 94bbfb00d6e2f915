//! A fixed-size encrypted chunk of an Entry's compressed content (spec C9).

use serde::{Deserialize, Serialize};
use serde_big_array::BigArray;

use crate::MAC_LEN;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    #[serde(with = "BigArray")]
    pub author_pub_key: [u8; 33],
    pub index: u32,
    pub ciphertext: Vec<u8>,
    pub ciphertext_mac: [u8; MAC_LEN],
}

impl Page {
    pub fn new(author_pub_key: [u8; 33], index: u32, ciphertext: Vec<u8>, ciphertext_mac: [u8; MAC_LEN]) -> Self {
        Page { author_pub_key, index, ciphertext, ciphertext_mac }
    }
}
