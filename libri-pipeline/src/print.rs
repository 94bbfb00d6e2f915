//! The author-side pipeline: content bytes in, (Envelope, Entry, Pages) out (spec §4.6).

use libri_crypto::{mac, Eek, Identity, Kek};
use libri_document::entry::EntryContents;
use libri_document::{Document, Entry, Envelope, Page};

use crate::compress;
use crate::encrypt;
use crate::metadata::EntryMetadata;
use crate::params::Parameters;

pub struct PrintOutput {
    pub envelope: Envelope,
    pub entry: Entry,
    pub pages: Vec<Page>,
}

/// Compresses, paginates, encrypts, and MACs `content`, then wraps the result for
/// `reader_pub_key`. Page encryption runs up to `params.parallelism` at a time, preserving
/// page order in the returned `pages` (spec §4.6 "Parallelism").
pub async fn print(
    content: &[u8],
    media_type: &str,
    author: &Identity,
    reader_pub_key: &[u8; 33],
    params: &Parameters,
) -> anyhow::Result<PrintOutput> {
    let eek = Eek::generate();
    let uncompressed_mac = mac::tag(&eek.hmac_key, content);
    let uncompressed_size = content.len() as u64;

    let codec = compress::select_codec(media_type);
    let compressed = compress::compress(codec, content, params.compression_buffer_size)?;
    let ciphertext_size = compressed.len() as u64;

    let raw_pages: Vec<Vec<u8>> = crate::paginate::paginate(&compressed, params.page_size)
        .into_iter()
        .map(|p| p.to_vec())
        .collect();

    let encrypted_pages = encrypt_pages_ordered(&eek, raw_pages, params.parallelism).await?;

    let author_pub_key = author.public_key_bytes();
    let pages: Vec<Page> = encrypted_pages
        .into_iter()
        .enumerate()
        .map(|(i, (ciphertext, ciphertext_mac))| Page::new(author_pub_key, i as u32, ciphertext, ciphertext_mac))
        .collect();

    let entry_metadata = EntryMetadata {
        media_type: media_type.to_string(),
        compression_codec: codec.into(),
        ciphertext_size,
        uncompressed_size,
        uncompressed_mac,
    };
    let metadata_plain = bincode::serialize(&entry_metadata)?;
    let (metadata_ciphertext, metadata_ciphertext_mac) = encrypt::encrypt_metadata(&eek, &metadata_plain)?;

    let contents = match pages.len() {
        1 => EntryContents::SinglePage(pages[0].clone()),
        _ => {
            let keys = pages.iter().map(|p| Document::Page(p.clone()).key()).collect();
            EntryContents::PageKeys(keys)
        }
    };

    let entry = Entry {
        author_pub_key,
        created_time_unix: now_unix(),
        metadata_ciphertext,
        metadata_ciphertext_mac,
        contents,
    };
    let entry_key = Document::Entry(entry.clone()).key();

    let kek = Kek::derive(author, reader_pub_key)?;
    let eek_ciphertext = eek.encrypt_under(&kek)?;
    let eek_ciphertext_mac = mac::tag(&kek.hmac_key, &eek_ciphertext);

    let envelope = Envelope {
        entry_key,
        author_pub_key,
        reader_pub_key: *reader_pub_key,
        eek_ciphertext,
        eek_ciphertext_mac,
    };

    // the pages returned to the caller are only the ones actually stored separately; a
    // single-page Entry embeds its page and stores nothing extra
    let stored_pages = if matches!(entry.contents, EntryContents::PageKeys(_)) { pages } else { Vec::new() };

    Ok(PrintOutput { envelope, entry, pages: stored_pages })
}

async fn encrypt_pages_ordered(
    eek: &Eek,
    raw_pages: Vec<Vec<u8>>,
    parallelism: usize,
) -> anyhow::Result<Vec<(Vec<u8>, [u8; mac::HMAC_LEN])>> {
    let mut out = Vec::with_capacity(raw_pages.len());
    for chunk in raw_pages.chunks(parallelism.max(1)) {
        let mut handles = Vec::with_capacity(chunk.len());
        for (offset, page) in chunk.iter().enumerate() {
            let eek_bytes = eek.to_bytes();
            let page = page.clone();
            let index = (out.len() + offset) as u32;
            handles.push(tokio::task::spawn_blocking(move || {
                let eek = Eek::from_bytes(&eek_bytes).expect("round-tripped EEK bytes are well-formed");
                encrypt::encrypt_page(&eek, index, &page)
            }));
        }
        for handle in handles {
            out.push(handle.await??);
        }
    }
    Ok(out)
}

fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("clock before epoch")
        .as_secs() as i64
}
