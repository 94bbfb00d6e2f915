//! The plaintext structure encrypted into `Entry.metadata_ciphertext`.

use serde::{Deserialize, Serialize};

use crate::compress::Codec;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) enum WireCodec {
    None,
    Gzip,
}

impl From<Codec> for WireCodec {
    fn from(codec: Codec) -> Self {
        match codec {
            Codec::None => WireCodec::None,
            Codec::Gzip => WireCodec::Gzip,
        }
    }
}

impl From<WireCodec> for Codec {
    fn from(codec: WireCodec) -> Self {
        match codec {
            WireCodec::None => Codec::None,
            WireCodec::Gzip => Codec::Gzip,
        }
    }
}

/// Round-tripped between Printer and Acquirer; never stored or transmitted except as
/// ciphertext inside the Entry (spec §4.6's `ValidateEntryMetadata` family).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct EntryMetadata {
    pub media_type: String,
    pub compression_codec: WireCodec,
    pub ciphertext_size: u64,
    pub uncompressed_size: u64,
    pub uncompressed_mac: [u8; 32],
}
