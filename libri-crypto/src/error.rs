use thiserror::Error;

/// Errors surfaced by the crypto primitives (spec error family `Crypto`).
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("signature invalid")]
    SignatureInvalid,

    #[error("mac mismatch")]
    MacMismatch,

    #[error("decryption failed")]
    DecryptionFailed,

    #[error("invalid key length: expected {expected}, found {found}")]
    InvalidKeyLength { expected: usize, found: usize },

    #[error("key derivation failed: {0}")]
    DerivationFailed(String),

    #[error("request timestamp outside allowed skew")]
    TimestampSkew,

    #[error("malformed request id: expected 32 bytes, found {0}")]
    MalformedRequestId(usize),
}

pub type Result<T> = std::result::Result<T, CryptoError>;
