//! Media-type-selected compression (spec §4.6 step 1).

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

/// Media types already compressed, for which a second GZIP pass buys nothing.
const ALREADY_COMPRESSED: &[&str] = &["application/x-gzip", "application/zip", "application/x-xz"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    None,
    Gzip,
}

pub fn select_codec(media_type: &str) -> Codec {
    if ALREADY_COMPRESSED.contains(&media_type) {
        Codec::None
    } else {
        Codec::Gzip
    }
}

pub fn compress(codec: Codec, input: &[u8], buffer_size: usize) -> anyhow::Result<Vec<u8>> {
    match codec {
        Codec::None => Ok(input.to_vec()),
        Codec::Gzip => {
            let mut encoder = GzEncoder::new(Vec::with_capacity(buffer_size.min(input.len().max(1))), Compression::default());
            encoder.write_all(input)?;
            Ok(encoder.finish()?)
        }
    }
}

pub fn decompress(codec: Codec, input: &[u8]) -> anyhow::Result<Vec<u8>> {
    match codec {
        Codec::None => Ok(input.to_vec()),
        Codec::Gzip => {
            let mut decoder = GzDecoder::new(input);
            let mut out = Vec::new();
            decoder.read_to_end(&mut out)?;
            Ok(out)
        }
    }
}
