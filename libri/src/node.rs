//! The Librarian node: wires identity, routing table, and store together, then dispatches
//! Find/Put/Verify through an in-process peer [`Registry`] that stands in for the real
//! network transport (out of scope per the external-interfaces section of the spec, same
//! role as `libri_pipeline::DocumentSource` on the read side).
//!
//! Construction is two-phase: `Node::new` builds the node with an empty registry handle,
//! and the caller `registry.join(node)`s it afterward, because the registry itself needs a
//! reference to the fully-built node to route RPCs back to it.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use rand::rngs::OsRng;
use rand::RngCore;

use libri_core::error::Result;
use libri_core::finder::{FindResponse, FindResult, Finder, PeerAddress, QueryError};
use libri_core::id::Id;
use libri_core::introduce_search_store::{self, Putter, SearchOutcome, StoreParameters};
use libri_core::lookup::Parameters;
use libri_core::peer::{Address, Peer};
use libri_core::routing::RoutingTable;
use libri_crypto::Identity;
use libri_document::Document;

use crate::config::Config;
use crate::store::{InMemoryStore, KvStore, NS_DOCUMENTS, NS_ROUTING};

/// A process-local directory of running nodes. Real deployments replace this with an actual
/// RPC client/server pair; every node here still goes through the same `Finder`/`Putter`
/// seams, so swapping in a networked implementation touches only this module.
#[derive(Clone, Default)]
pub struct Registry {
    nodes: Arc<RwLock<HashMap<Id, Arc<Node>>>>,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    pub fn join(&self, node: Arc<Node>) {
        self.nodes.write().expect("registry lock poisoned").insert(node.id(), node);
    }

    fn get(&self, id: &Id) -> Option<Arc<Node>> {
        self.nodes.read().expect("registry lock poisoned").get(id).cloned()
    }
}

pub struct Node {
    id: Id,
    identity: Identity,
    table: RwLock<RoutingTable>,
    store: Arc<dyn KvStore>,
    registry: Registry,
    config: Config,
}

impl Node {
    pub fn new(identity: Identity, config: Config, store: Arc<dyn KvStore>, registry: Registry) -> Arc<Self> {
        let id = Id::from_bytes(identity.node_id_bytes());
        let table = RoutingTable::with_k(id, config.k);
        Arc::new(Node { id, identity, table: RwLock::new(table), store, registry, config })
    }

    pub fn id(&self) -> Id {
        self.id
    }

    pub fn address(&self) -> Address {
        Address::new(self.config.public_addr.clone())
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    fn lookup_params(&self) -> Parameters {
        Parameters {
            n_closest_responses: self.config.n_closest_responses,
            n_max_errors: self.config.n_max_errors,
            concurrency: self.config.concurrency,
            query_timeout: self.config.query_timeout,
        }
    }

    /// Joins the network by running Introduce against `seeds`, populating the routing table
    /// with whoever responds (spec §4.2 bootstrap).
    pub async fn bootstrap(self: &Arc<Self>, seeds: Vec<PeerAddress>) -> Result<usize> {
        let mut rng = OsRng;
        let finder: Arc<dyn Finder<Document>> = self.clone();
        let mut table = self.table.write().expect("routing table lock poisoned");
        introduce_search_store::introduce(&mut table, seeds, self.lookup_params(), finder, &mut rng).await
    }

    /// Searches for `key`, returning the document if found or the closest-k peers otherwise
    /// (spec §4.5).
    pub async fn search(self: &Arc<Self>, key: Id) -> Result<SearchOutcome<Document>> {
        let mut rng = OsRng;
        let finder: Arc<dyn Finder<Document>> = self.clone();
        let table = self.table.read().expect("routing table lock poisoned");
        introduce_search_store::search(&table, key, self.lookup_params(), finder, &mut rng).await
    }

    /// Stores `doc` at its content-addressed key, fanning `Put` out to the closest-k peers
    /// found by a preceding Search (spec §4.5).
    pub async fn store(self: &Arc<Self>, doc: Document) -> Result<usize> {
        let key = doc.key();
        self.store.put(NS_DOCUMENTS, key.as_bytes(), bincode::serialize(&doc).expect("Document serializes"));

        let mut rng = OsRng;
        let finder: Arc<dyn Finder<Document>> = self.clone();
        let putter: Arc<dyn Putter<Document>> = self.clone();
        let params = StoreParameters { lookup: self.lookup_params(), put_parallelism: self.config.put_parallelism, put_quorum: self.config.put_quorum };
        let table = self.table.read().expect("routing table lock poisoned");
        introduce_search_store::store(&table, key, doc, params, finder, putter, &mut rng).await
    }

    /// Issues a Verify challenge to `peer` for `key`, confirming they actually hold the
    /// document rather than merely claiming to (spec §11 supplement).
    pub async fn verify(&self, peer: &PeerAddress, key: &Id) -> std::result::Result<bool, QueryError> {
        let other = self.registry.get(&peer.id).ok_or(QueryError::Unreachable)?;
        let doc = other.store.get(NS_DOCUMENTS, key.as_bytes()).ok_or(QueryError::Unreachable)?;
        let doc: Document = bincode::deserialize(&doc).map_err(|_| QueryError::Unreachable)?;

        let mut nonce = [0u8; 32];
        OsRng.fill_bytes(&mut nonce);
        let response = libri_document::verify::respond(&doc, &nonce);
        Ok(libri_document::verify::check(&doc, &nonce, &response))
    }

    fn persist_peer(&self, peer: &Peer) {
        let mut table = self.table.write().expect("routing table lock poisoned");
        table.push(peer.clone());
        self.store.put(NS_ROUTING, peer.id.as_bytes(), bincode::serialize(&peer).expect("Peer serializes"));
    }
}

#[async_trait]
impl Finder<Document> for Node {
    async fn find(&self, peer: &PeerAddress, target: &Id, request_id: [u8; 32]) -> std::result::Result<FindResponse<Document>, QueryError> {
        let other = self.registry.get(&peer.id).ok_or(QueryError::Unreachable)?;
        if let Some(bytes) = other.store.get(NS_DOCUMENTS, target.as_bytes()) {
            let doc: Document = bincode::deserialize(&bytes).map_err(|_| QueryError::Unreachable)?;
            return Ok(FindResponse { request_id, result: FindResult::Value(doc) });
        }
        let closest = {
            let table = other.table.read().expect("routing table lock poisoned");
            table.peak(target, table.k())
        };
        let peers = closest.into_iter().map(|p| PeerAddress::new(p.id, p.address)).collect();
        Ok(FindResponse { request_id, result: FindResult::Peers(peers) })
    }
}

#[async_trait]
impl Putter<Document> for Node {
    async fn put(&self, peer: &PeerAddress, key: &Id, value: &Document, _request_id: [u8; 32]) -> std::result::Result<(), QueryError> {
        let other = self.registry.get(&peer.id).ok_or(QueryError::Unreachable)?;
        other.store.put(NS_DOCUMENTS, key.as_bytes(), bincode::serialize(value).map_err(|_| QueryError::Unreachable)?);
        other.persist_peer(&Peer::new(self.id, self.address()));
        Ok(())
    }
}
