//! API-boundary error taxonomy (spec §7). Internally, most functions return `anyhow::Result`
//! or a narrow local error and convert to `LibriError` only where a caller needs to
//! distinguish kinds.

use libri_crypto::CryptoError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("unexpected document type")]
    UnexpectedDocumentType,
    #[error("unexpected document key")]
    UnexpectedKey,
    #[error("unexpected request id")]
    UnexpectedRequestId,
    #[error("validation failed for field {0}")]
    ValidationFailed(String),
}

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("too many query errors")]
    TooManyQueryErrors,
    #[error("exhausted unqueried peers before filling the closest set")]
    Exhausted,
    #[error("fatal lookup error: {0}")]
    FatalErr(String),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("peer unreachable")]
    Unreachable,
    #[error("request cancelled")]
    Cancelled,
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("document missing")]
    Missing,
    #[error("store full")]
    StoreFull,
    #[error("corrupt document")]
    CorruptDocument,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

/// The umbrella error type returned at every public API boundary in the workspace.
#[derive(Debug, Error)]
pub enum LibriError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error(transparent)]
    Lookup(#[from] LookupError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, LibriError>;
