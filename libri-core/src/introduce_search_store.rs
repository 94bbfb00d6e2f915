//! Introduce, Search, and Store (spec C6): the three specializations of the lookup engine
//! against a live routing table.

use std::sync::Arc;

use rand::RngCore;

use crate::error::{LookupError, Result};
use crate::finder::{Finder, PeerAddress};
use crate::id::Id;
use crate::lookup::{self, DefaultResponseProcessor, LookupResult, LookupStatus, Parameters, ResponseProcessor};
use crate::peer::{Address, Peer};
use crate::routing::RoutingTable;

/// Runs a bootstrap lookup against `target` (conventionally the local node's own ID),
/// inserting every responder into `table`. Bootstrap tolerates a noisier network than a
/// regular search: it only fails if every seed errors out.
pub async fn introduce<V: Clone + Send + Sync + 'static>(
    table: &mut RoutingTable,
    seeds: Vec<PeerAddress>,
    params: Parameters,
    finder: Arc<dyn Finder<V>>,
    rng: &mut impl RngCore,
) -> Result<usize> {
    let self_id = table.self_id();
    let target = self_id;
    let result = lookup::run(self_id, target, seeds, params, finder, Arc::new(DefaultResponseProcessor), rng).await;

    if result.responded.is_empty() && !result.errored.is_empty() {
        return Err(LookupError::TooManyQueryErrors.into());
    }

    let mut inserted = 0;
    for peer_addr in result.responded.values() {
        table.push(Peer::new(peer_addr.id, Address::new(peer_addr.address.0.clone())));
        inserted += 1;
    }
    Ok(inserted)
}

/// The outcome of a [`search`]: either the document value (short-circuited the moment any
/// peer returned it) or the closest-k peers found, for the caller to `Put` against.
pub enum SearchOutcome<V> {
    Value(V),
    ClosestPeers(Vec<PeerAddress>),
}

/// Looks up `key` starting from `table`'s closest known peers, short-circuiting on the
/// first value response (spec §4.5).
pub async fn search<V: Clone + Send + Sync + 'static>(
    table: &RoutingTable,
    key: Id,
    params: Parameters,
    finder: Arc<dyn Finder<V>>,
    rng: &mut impl RngCore,
) -> Result<SearchOutcome<V>> {
    search_with_processor(table, key, params, finder, Arc::new(DefaultResponseProcessor), rng).await
}

/// As [`search`], but with an injectable [`ResponseProcessor`] (spec §11 supplement), the
/// seam tests use to exercise fatal-processing-error behavior deterministically.
pub async fn search_with_processor<V: Clone + Send + Sync + 'static>(
    table: &RoutingTable,
    key: Id,
    params: Parameters,
    finder: Arc<dyn Finder<V>>,
    processor: Arc<dyn ResponseProcessor<V>>,
    rng: &mut impl RngCore,
) -> Result<SearchOutcome<V>> {
    let self_id = table.self_id();
    let seeds = peer_addresses(table.peak(&key, table.k()));

    let result = lookup::run(self_id, key, seeds, params.clone(), finder, processor, rng).await;
    into_search_outcome(result, &params)
}

fn into_search_outcome<V>(result: LookupResult<V>, params: &Parameters) -> Result<SearchOutcome<V>> {
    match result.status(params) {
        LookupStatus::FoundValue => {
            Ok(SearchOutcome::Value(result.value.expect("FoundValue implies value is set")))
        }
        LookupStatus::FoundClosestPeers | LookupStatus::Exhausted => {
            Ok(SearchOutcome::ClosestPeers(result.closest_peers()))
        }
        LookupStatus::TooManyErrors => Err(LookupError::TooManyQueryErrors.into()),
        LookupStatus::Running => {
            // lookup::run always drives to a terminal status before returning
            Err(LookupError::FatalErr("lookup returned before reaching a terminal status".into()).into())
        }
    }
}

/// Parameters governing the fan-out of the final `Put` phase of a [`store`] (spec §4.5,
/// §9's resolved `put_quorum` default).
#[derive(Debug, Clone)]
pub struct StoreParameters {
    pub lookup: Parameters,
    pub put_parallelism: usize,
    pub put_quorum: usize,
}

impl Default for StoreParameters {
    fn default() -> Self {
        StoreParameters { lookup: Parameters::default(), put_parallelism: 3, put_quorum: 1 }
    }
}

/// Capability for the RPC `store` issues once it has found the closest-k peers to a key
/// (spec C4's `Put`, mirrored on `Finder`'s `Find`).
#[async_trait::async_trait]
pub trait Putter<V>: Send + Sync {
    async fn put(&self, peer: &PeerAddress, key: &Id, value: &V, request_id: [u8; 32]) -> std::result::Result<(), crate::finder::QueryError>;
}

/// Searches for `key`'s closest-k peers, then `Put`s `value` to up to `put_parallelism` of
/// them concurrently, succeeding once `put_quorum` accept it.
pub async fn store<V: Clone + Send + Sync + 'static>(
    table: &RoutingTable,
    key: Id,
    value: V,
    params: StoreParameters,
    finder: Arc<dyn Finder<V>>,
    putter: Arc<dyn Putter<V>>,
    rng: &mut impl RngCore,
) -> Result<usize> {
    let self_id = table.self_id();
    let seeds = peer_addresses(table.peak(&key, table.k()));
    let lookup_result = lookup::run(
        self_id,
        key,
        seeds,
        params.lookup.clone(),
        finder,
        Arc::new(DefaultResponseProcessor),
        rng,
    )
    .await;

    let targets = match into_search_outcome(lookup_result, &params.lookup)? {
        SearchOutcome::Value(_) => {
            // someone already has it; still (re-)propagate to the closest-k to refresh TTL
            return Ok(0);
        }
        SearchOutcome::ClosestPeers(peers) => peers,
    };

    let mut accepted = 0;
    for chunk in targets.chunks(params.put_parallelism.max(1)) {
        let mut futures = Vec::new();
        for peer in chunk {
            let mut request_id = [0u8; 32];
            rng.fill_bytes(&mut request_id);
            let putter = Arc::clone(&putter);
            let peer = peer.clone();
            let key = key;
            let value = value.clone();
            futures.push(async move { putter.put(&peer, &key, &value, request_id).await });
        }
        let results = futures::future::join_all(futures).await;
        accepted += results.iter().filter(|r| r.is_ok()).count();
        if accepted >= params.put_quorum {
            break;
        }
    }

    if accepted < params.put_quorum {
        return Err(LookupError::TooManyQueryErrors.into());
    }
    Ok(accepted)
}

fn peer_addresses(peers: Vec<Peer>) -> Vec<PeerAddress> {
    peers.into_iter().map(|p| PeerAddress::new(p.id, p.address)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finder::{FindResponse, FindResult};
    use async_trait::async_trait;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::collections::HashMap;

    struct GraphFinder {
        adjacency: HashMap<Id, Vec<PeerAddress>>,
        value_at: Option<Id>,
    }

    #[async_trait]
    impl Finder<&'static str> for GraphFinder {
        async fn find(
            &self,
            peer: &PeerAddress,
            _target: &Id,
            request_id: [u8; 32],
        ) -> std::result::Result<FindResponse<&'static str>, crate::finder::QueryError> {
            if self.value_at == Some(peer.id) {
                return Ok(FindResponse { request_id, result: FindResult::Value("the document") });
            }
            let peers = self.adjacency.get(&peer.id).cloned().unwrap_or_default();
            Ok(FindResponse { request_id, result: FindResult::Peers(peers) })
        }
    }

    struct CountingPutter {
        calls: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl Putter<&'static str> for CountingPutter {
        async fn put(&self, _peer: &PeerAddress, _key: &Id, _value: &&'static str, _request_id: [u8; 32]) -> std::result::Result<(), crate::finder::QueryError> {
            self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(())
        }
    }

    fn build_graph(n: usize, rng: &mut ChaCha8Rng) -> (HashMap<Id, Vec<PeerAddress>>, Vec<Peer>) {
        let peers: Vec<Peer> = (0..n).map(|i| Peer::new(Id::random(rng), Address::new(format!("p{i}")))).collect();
        let mut adjacency = HashMap::new();
        for (i, p) in peers.iter().enumerate() {
            let neighbors: Vec<PeerAddress> = peers
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .take(6)
                .map(|(_, p)| PeerAddress::new(p.id, p.address.clone()))
                .collect();
            adjacency.insert(p.id, neighbors);
        }
        (adjacency, peers)
    }

    #[tokio::test]
    async fn introduce_populates_the_routing_table_from_responders() {
        let mut rng = ChaCha8Rng::seed_from_u64(20);
        let self_id = Id::random(&mut rng);
        let mut table = RoutingTable::new(self_id);
        let (adjacency, peers) = build_graph(16, &mut rng);
        let seeds: Vec<PeerAddress> = peers.iter().take(4).map(|p| PeerAddress::new(p.id, p.address.clone())).collect();
        let finder: Arc<dyn Finder<()>> = Arc::new(AdjacencyOnly { adjacency });

        let mut run_rng = ChaCha8Rng::seed_from_u64(21);
        let inserted = introduce(&mut table, seeds, Parameters::default(), finder, &mut run_rng).await.unwrap();
        assert!(inserted > 0);
        assert!(table.num_peers() > 0);
    }

    struct AdjacencyOnly {
        adjacency: HashMap<Id, Vec<PeerAddress>>,
    }
    #[async_trait]
    impl Finder<()> for AdjacencyOnly {
        async fn find(&self, peer: &PeerAddress, _target: &Id, request_id: [u8; 32]) -> std::result::Result<FindResponse<()>, crate::finder::QueryError> {
            let peers = self.adjacency.get(&peer.id).cloned().unwrap_or_default();
            Ok(FindResponse { request_id, result: FindResult::Peers(peers) })
        }
    }

    #[tokio::test]
    async fn search_short_circuits_on_value() {
        let mut rng = ChaCha8Rng::seed_from_u64(22);
        let self_id = Id::random(&mut rng);
        let mut table = RoutingTable::new(self_id);
        let (adjacency, peers) = build_graph(16, &mut rng);
        for p in &peers {
            table.push(p.clone());
        }
        let value_at = peers[3].id;
        let finder: Arc<dyn Finder<&'static str>> = Arc::new(GraphFinder { adjacency, value_at: Some(value_at) });
        let key = Id::random(&mut rng);
        let mut run_rng = ChaCha8Rng::seed_from_u64(23);

        let outcome = search(&table, key, Parameters::default(), finder, &mut run_rng).await.unwrap();
        match outcome {
            SearchOutcome::Value(v) => assert_eq!(v, "the document"),
            SearchOutcome::ClosestPeers(_) => panic!("expected a value"),
        }
    }

    #[tokio::test]
    async fn store_puts_to_quorum_of_closest_peers() {
        let mut rng = ChaCha8Rng::seed_from_u64(24);
        let self_id = Id::random(&mut rng);
        let mut table = RoutingTable::new(self_id);
        let (adjacency, peers) = build_graph(16, &mut rng);
        for p in &peers {
            table.push(p.clone());
        }
        let finder: Arc<dyn Finder<&'static str>> = Arc::new(GraphFinder { adjacency, value_at: None });
        let putter = Arc::new(CountingPutter { calls: std::sync::atomic::AtomicUsize::new(0) });
        let key = Id::random(&mut rng);
        let mut run_rng = ChaCha8Rng::seed_from_u64(25);

        let accepted = store(
            &table,
            key,
            "a new document",
            StoreParameters { put_quorum: 2, put_parallelism: 2, ..Default::default() },
            finder,
            putter.clone(),
            &mut run_rng,
        )
        .await
        .unwrap();

        assert!(accepted >= 2);
        assert!(putter.calls.load(std::sync::atomic::Ordering::SeqCst) >= 2);
    }
}
