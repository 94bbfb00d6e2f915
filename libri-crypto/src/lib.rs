//! Cryptographic primitives for Libri (spec component C7): ECDSA P-256 node identities,
//! ECDH key agreement, HKDF-SHA256, AES-256-GCM, and HMAC-SHA256.

pub mod ecdh;
pub mod envelope;
pub mod error;
pub mod identity;
pub mod kdf;
pub mod mac;
pub mod symmetric;

pub use envelope::{Eek, Kek, EEK_CIPHERTEXT_LEN, EEK_LEN, KEK_LEN};
pub use error::{CryptoError, Result};
pub use identity::{Identity, SignedRequest, MAX_TIMESTAMP_SKEW_SECS, PUBLIC_KEY_LEN, REQUEST_ID_LEN};
