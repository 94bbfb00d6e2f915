//! The Finder RPC capability (spec C4): issue a `Find` against a peer and get back either
//! closer peers or the document value.

use async_trait::async_trait;
use thiserror::Error;

use crate::id::Id;
use crate::peer::Address;

/// A peer's advertised identity and address, as carried on the wire (no stats: those are
/// local bookkeeping, never transmitted). Grounded on the source's `api.PeerAddress`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerAddress {
    pub id: Id,
    pub address: Address,
}

impl PeerAddress {
    pub fn new(id: Id, address: Address) -> Self {
        PeerAddress { id, address }
    }
}

/// Either up to K peers closer to the target, or the document value — exactly one (spec §6).
#[derive(Debug, Clone)]
pub enum FindResult<V> {
    Peers(Vec<PeerAddress>),
    Value(V),
}

#[derive(Debug, Clone)]
pub struct FindResponse<V> {
    pub request_id: [u8; 32],
    pub result: FindResult<V>,
}

/// Errors a single Find RPC can fail with. These are *local* (spec §7 propagation policy):
/// the lookup engine records them in `errored` rather than surfacing them to its caller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("request timed out")]
    Timeout,
    #[error("peer unreachable")]
    Unreachable,
    #[error("response echoed a different request id")]
    UnexpectedRequestId,
    #[error("response processing failed: {0}")]
    ProcessingFailed(String),
}

/// Capability trait for issuing a Find RPC. Implementations are tagged variants: a real
/// network client, an in-memory fixture for tests, or one that always errors (spec §9
/// "Polymorphism via capability sets").
#[async_trait]
pub trait Finder<V>: Send + Sync {
    async fn find(
        &self,
        peer: &PeerAddress,
        target: &Id,
        request_id: [u8; 32],
    ) -> Result<FindResponse<V>, QueryError>;
}

/// Verifies that a response echoes the request ID the caller sent, the first gate every
/// Find response passes through before its contents are trusted (spec C4, §11 supplement).
pub fn verify_response_echo(sent: &[u8; 32], response: &FindResponse<impl Sized>) -> Result<(), QueryError> {
    if &response.request_id != sent {
        return Err(QueryError::UnexpectedRequestId);
    }
    Ok(())
}
