//! The Libri document model (spec C9): Page, Entry, and Envelope, their content-addressed
//! key, and structural validation.

pub mod document;
pub mod entry;
pub mod envelope;
pub mod page;
pub mod validate;
pub mod verify;

pub const PUBLIC_KEY_LEN: usize = 33;
pub const MAC_LEN: usize = 32;

pub use document::Document;
pub use entry::{Entry, EntryContents};
pub use envelope::Envelope;
pub use page::Page;
