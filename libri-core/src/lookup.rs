//! The generic iterative closest-k lookup engine (spec C5) — the heart of Introduce,
//! Search, and Store.

use std::collections::{BinaryHeap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::FuturesUnordered;
use futures::StreamExt;
use rand::RngCore;

use crate::finder::{Finder, FindResult, PeerAddress, QueryError};
use crate::id::Id;

/// Default lookup parameters (spec §4.4).
pub const DEFAULT_N_CLOSEST_RESPONSES: usize = 8;
pub const DEFAULT_N_MAX_ERRORS: usize = 3;
pub const DEFAULT_CONCURRENCY: usize = 3;
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct Parameters {
    pub n_closest_responses: usize,
    pub n_max_errors: usize,
    pub concurrency: usize,
    pub query_timeout: Duration,
}

impl Default for Parameters {
    fn default() -> Self {
        Parameters {
            n_closest_responses: DEFAULT_N_CLOSEST_RESPONSES,
            n_max_errors: DEFAULT_N_MAX_ERRORS,
            concurrency: DEFAULT_CONCURRENCY,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }
}

/// A peer plus its XOR distance to the lookup target, the heap key for both `unqueried`
/// (min-heap) and `closest` (bounded max-heap).
#[derive(Debug, Clone)]
struct DistancedPeer {
    distance: Id,
    peer: PeerAddress,
}

impl PartialEq for DistancedPeer {
    fn eq(&self, other: &Self) -> bool {
        self.distance == other.distance && self.peer.id == other.peer.id
    }
}
impl Eq for DistancedPeer {}

impl Ord for DistancedPeer {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // ties broken by peer-ID for determinism (spec §4.4 ordering guarantees)
        self.distance.cmp(&other.distance).then_with(|| self.peer.id.cmp(&other.peer.id))
    }
}
impl PartialOrd for DistancedPeer {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupStatus {
    Running,
    FoundValue,
    FoundClosestPeers,
    TooManyErrors,
    Exhausted,
}

/// Per-lookup state: `target`, `unqueried`, `closest`, `responded`, `errored`, `value`,
/// `fatal_err` (spec §4.4 State).
pub struct LookupResult<V> {
    pub target: Id,
    unqueried: BinaryHeap<std::cmp::Reverse<DistancedPeer>>,
    unqueried_ids: HashSet<Id>,
    closest: BinaryHeap<DistancedPeer>,
    pub responded: HashMap<Id, PeerAddress>,
    pub errored: HashSet<Id>,
    pub value: Option<V>,
    pub fatal_err: Option<String>,
}

impl<V> LookupResult<V> {
    pub fn new(target: Id) -> Self {
        LookupResult {
            target,
            unqueried: BinaryHeap::new(),
            unqueried_ids: HashSet::new(),
            closest: BinaryHeap::new(),
            responded: HashMap::new(),
            errored: HashSet::new(),
            value: None,
            fatal_err: None,
        }
    }

    pub fn unqueried_len(&self) -> usize {
        self.unqueried.len()
    }

    pub fn closest_len(&self) -> usize {
        self.closest.len()
    }

    pub fn closest_peers(&self) -> Vec<PeerAddress> {
        self.closest.iter().map(|dp| dp.peer.clone()).collect()
    }

    /// The farthest distance currently in `closest` (the heap's root), if any.
    pub fn peak_distance(&self) -> Option<Id> {
        self.closest.peek().map(|dp| dp.distance)
    }

    /// `AddPeers`-style dedup-merge (spec §11): offers each of `candidates` into `unqueried`
    /// unless it is the local node, already responded, already errored, or already queued.
    pub fn add_peers(&mut self, self_id: &Id, candidates: Vec<PeerAddress>) {
        for candidate in candidates {
            if &candidate.id == self_id {
                continue;
            }
            if self.responded.contains_key(&candidate.id) {
                continue;
            }
            if self.errored.contains(&candidate.id) {
                continue;
            }
            if self.unqueried_ids.contains(&candidate.id) {
                continue;
            }
            let distance = self.target.distance(&candidate.id);
            self.unqueried_ids.insert(candidate.id);
            self.unqueried.push(std::cmp::Reverse(DistancedPeer { distance, peer: candidate }));
        }
    }

    fn pop_unqueried(&mut self) -> Option<PeerAddress> {
        let std::cmp::Reverse(dp) = self.unqueried.pop()?;
        self.unqueried_ids.remove(&dp.peer.id);
        Some(dp.peer)
    }

    fn record_responded(&mut self, peer: PeerAddress, n_closest_responses: usize) {
        let distance = self.target.distance(&peer.id);
        self.responded.insert(peer.id, peer.clone());
        if self.closest.len() < n_closest_responses {
            self.closest.push(DistancedPeer { distance, peer });
        } else if let Some(root) = self.closest.peek() {
            if distance < root.distance {
                self.closest.pop();
                self.closest.push(DistancedPeer { distance, peer });
            }
        }
    }

    fn record_errored(&mut self, peer_id: Id) {
        self.errored.insert(peer_id);
    }

    /// `closest` is full and no unqueried peer could improve it.
    pub fn found_closest_peers(&self, n_closest_responses: usize) -> bool {
        if self.closest.len() < n_closest_responses {
            return false;
        }
        let root_distance = match self.peak_distance() {
            Some(d) => d,
            None => return false,
        };
        match self.unqueried.peek() {
            None => true,
            Some(std::cmp::Reverse(next)) => root_distance <= next.distance,
        }
    }

    pub fn status(&self, params: &Parameters) -> LookupStatus {
        if self.value.is_some() {
            LookupStatus::FoundValue
        } else if self.errored.len() > params.n_max_errors {
            LookupStatus::TooManyErrors
        } else if self.found_closest_peers(params.n_closest_responses) {
            LookupStatus::FoundClosestPeers
        } else if self.unqueried.is_empty() {
            LookupStatus::Exhausted
        } else {
            LookupStatus::Running
        }
    }

    pub fn finished(&self, params: &Parameters) -> bool {
        !matches!(self.status(params), LookupStatus::Running)
    }
}

/// Seeds `result` with the caller's routing-table picks (or bootstrap addresses for
/// Introduce), deduping via the same rule `add_peers` uses.
pub fn seed<V>(result: &mut LookupResult<V>, self_id: &Id, seeds: Vec<PeerAddress>) {
    result.add_peers(self_id, seeds);
}

/// Hook between "an RPC returned" and "the lookup's shared state is updated" (spec §11,
/// grounded on the source's `ResponseProcessor.Process`). The default processor offers
/// returned peers to `unqueried` and captures a returned value; a custom processor can be
/// substituted in tests to exercise the fatal-error path independent of network behavior.
pub trait ResponseProcessor<V>: Send + Sync {
    fn process(&self, self_id: &Id, peer: &PeerAddress, result: FindResult<V>, state: &mut LookupResult<V>) -> Result<(), String>;
}

pub struct DefaultResponseProcessor;

impl<V> ResponseProcessor<V> for DefaultResponseProcessor {
    fn process(&self, self_id: &Id, _peer: &PeerAddress, result: FindResult<V>, state: &mut LookupResult<V>) -> Result<(), String> {
        match result {
            FindResult::Peers(peers) => {
                state.add_peers(self_id, peers);
                Ok(())
            }
            FindResult::Value(v) => {
                state.value = Some(v);
                Ok(())
            }
        }
    }
}

/// Runs the lookup to completion against `finder`, starting from `seeds`.
pub async fn run<V: Clone + Send + Sync + 'static>(
    self_id: Id,
    target: Id,
    seeds: Vec<PeerAddress>,
    params: Parameters,
    finder: Arc<dyn Finder<V>>,
    processor: Arc<dyn ResponseProcessor<V>>,
    rng: &mut impl RngCore,
) -> LookupResult<V> {
    let mut state = LookupResult::new(target);
    self::seed(&mut state, &self_id, seeds);

    type PendingOutcome<V> = (PeerAddress, [u8; 32], Result<crate::finder::FindResponse<V>, QueryError>);
    let mut in_flight: FuturesUnordered<std::pin::Pin<Box<dyn std::future::Future<Output = PendingOutcome<V>> + Send>>> =
        FuturesUnordered::new();

    loop {
        while in_flight.len() < params.concurrency {
            let Some(peer) = state.pop_unqueried() else { break };
            let mut request_id = [0u8; 32];
            rng.fill_bytes(&mut request_id);
            let finder = Arc::clone(&finder);
            let timeout = params.query_timeout;
            let target = state.target;
            let fut = async move {
                let outcome = tokio::time::timeout(timeout, finder.find(&peer, &target, request_id)).await;
                let result = match outcome {
                    Ok(r) => r,
                    Err(_) => Err(QueryError::Timeout),
                };
                (peer, request_id, result)
            };
            in_flight.push(Box::pin(fut));
        }

        if in_flight.is_empty() {
            break;
        }

        if let Some((peer, request_id, outcome)) = in_flight.next().await {
            match outcome {
                Ok(response) if response.request_id == request_id => {
                    state.record_responded(peer.clone(), params.n_closest_responses);
                    if let Err(msg) = processor.process(&self_id, &peer, response.result, &mut state) {
                        state.fatal_err = Some(msg);
                        state.record_errored(peer.id);
                    }
                }
                Ok(_mismatched) => {
                    state.record_errored(peer.id);
                }
                Err(_e) => {
                    state.record_errored(peer.id);
                }
            }
        }

        if !matches!(state.status(&params), LookupStatus::Running) {
            break;
        }
    }

    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finder::FindResponse;
    use crate::peer::Address;
    use async_trait::async_trait;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::collections::HashMap as StdHashMap;

    fn peer_addr(byte: u8) -> PeerAddress {
        PeerAddress::new(Id::from_bytes([byte; 32]), Address::new(format!("peer-{byte}")))
    }

    /// Answers from a fixed peer graph: `adjacency[id] = peers to return`.
    struct GraphFinder {
        adjacency: StdHashMap<Id, Vec<PeerAddress>>,
    }

    #[async_trait]
    impl Finder<()> for GraphFinder {
        async fn find(&self, peer: &PeerAddress, _target: &Id, request_id: [u8; 32]) -> Result<FindResponse<()>, QueryError> {
            let peers = self.adjacency.get(&peer.id).cloned().unwrap_or_default();
            Ok(FindResponse { request_id, result: FindResult::Peers(peers) })
        }
    }

    struct AlwaysErrorsFinder;

    #[async_trait]
    impl Finder<()> for AlwaysErrorsFinder {
        async fn find(&self, _peer: &PeerAddress, _target: &Id, _request_id: [u8; 32]) -> Result<FindResponse<()>, QueryError> {
            Err(QueryError::Unreachable)
        }
    }

    struct ErroringProcessor;
    impl ResponseProcessor<()> for ErroringProcessor {
        fn process(&self, _self_id: &Id, _peer: &PeerAddress, _result: FindResult<()>, _state: &mut LookupResult<()>) -> Result<(), String> {
            Err("some processing error".to_string())
        }
    }

    fn build_graph(n: usize, rng: &mut ChaCha8Rng) -> (StdHashMap<Id, Vec<PeerAddress>>, Vec<PeerAddress>) {
        let peers: Vec<PeerAddress> = (0..n).map(|i| PeerAddress::new(Id::random(rng), Address::new(format!("p{i}")))).collect();
        let mut adjacency = StdHashMap::new();
        for (i, p) in peers.iter().enumerate() {
            // each peer "knows" a handful of others, forming a connected enough graph
            let neighbors: Vec<PeerAddress> = peers
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .take(6)
                .map(|(_, p)| p.clone())
                .collect();
            adjacency.insert(p.id, neighbors);
        }
        (adjacency, peers)
    }

    #[tokio::test]
    async fn search_over_32_peers_returns_exactly_k_closest() {
        let mut rng = ChaCha8Rng::seed_from_u64(32);
        let (adjacency, peers) = build_graph(32, &mut rng);
        let self_id = Id::random(&mut rng);
        let target = Id::random(&mut rng);
        let finder: Arc<dyn Finder<()>> = Arc::new(GraphFinder { adjacency });

        for concurrency in 1..=3 {
            let params = Parameters { n_closest_responses: 8, concurrency, ..Default::default() };
            let seeds = peers.clone();
            let mut seed_rng = ChaCha8Rng::seed_from_u64(32);
            let result = run(self_id, target, seeds, params.clone(), Arc::clone(&finder), Arc::new(DefaultResponseProcessor), &mut seed_rng).await;

            assert!(result.finished(&params));
            assert!(result.found_closest_peers(8));
            assert!(result.errored.is_empty());
            assert_eq!(result.closest_len(), 8);
            assert!(result.closest_len() <= result.responded.len());
        }
    }

    #[tokio::test]
    async fn search_where_every_query_errors_yields_too_many_errors() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let self_id = Id::random(&mut rng);
        let target = Id::random(&mut rng);
        let seeds: Vec<PeerAddress> = (0..10).map(|_| PeerAddress::new(Id::random(&mut rng), Address::new("x"))).collect();
        let params = Parameters { concurrency: 1, n_max_errors: 3, ..Default::default() };
        let finder: Arc<dyn Finder<()>> = Arc::new(AlwaysErrorsFinder);
        let mut run_rng = ChaCha8Rng::seed_from_u64(8);

        let result = run(self_id, target, seeds, params.clone(), finder, Arc::new(DefaultResponseProcessor), &mut run_rng).await;

        assert_eq!(result.status(&params), LookupStatus::TooManyErrors);
        assert!(result.finished(&params));
        assert!(!result.found_closest_peers(params.n_closest_responses));
        assert_eq!(result.errored.len(), params.n_max_errors + 1);
        assert_eq!(result.closest_len(), 0);
        assert!(result.responded.is_empty());
    }

    #[tokio::test]
    async fn processing_errors_also_drive_the_peer_into_errored() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let self_id = Id::random(&mut rng);
        let target = Id::random(&mut rng);
        let seeds: Vec<PeerAddress> = (0..10).map(|_| PeerAddress::new(Id::random(&mut rng), Address::new("x"))).collect();
        let params = Parameters { concurrency: 1, n_max_errors: 3, ..Default::default() };
        let (adjacency, _) = build_graph(0, &mut rng);
        let finder: Arc<dyn Finder<()>> = Arc::new(GraphFinder { adjacency });
        let mut run_rng = ChaCha8Rng::seed_from_u64(10);

        let result = run(self_id, target, seeds, params.clone(), finder, Arc::new(ErroringProcessor), &mut run_rng).await;

        assert!(result.fatal_err.is_some());
        assert_eq!(result.errored.len(), params.n_max_errors + 1);
        assert_eq!(result.closest_len(), 0);
    }

    #[tokio::test]
    async fn value_found_on_first_hop_short_circuits() {
        struct ValueFinder;
        #[async_trait]
        impl Finder<&'static str> for ValueFinder {
            async fn find(&self, _peer: &PeerAddress, _target: &Id, request_id: [u8; 32]) -> Result<FindResponse<&'static str>, QueryError> {
                Ok(FindResponse { request_id, result: FindResult::Value("the document") })
            }
        }
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let self_id = Id::random(&mut rng);
        let target = Id::random(&mut rng);
        let seeds = vec![peer_addr(1), peer_addr(2), peer_addr(3)];
        let params = Parameters { concurrency: 1, ..Default::default() };
        let finder: Arc<dyn Finder<&'static str>> = Arc::new(ValueFinder);
        let mut run_rng = ChaCha8Rng::seed_from_u64(12);

        let result = run(self_id, target, seeds, params.clone(), finder, Arc::new(DefaultResponseProcessor), &mut run_rng).await;
        assert_eq!(result.value, Some("the document"));
        assert_eq!(result.status(&params), LookupStatus::FoundValue);
    }

    #[test]
    fn add_peers_dedups_against_unqueried_responded_and_self() {
        let mut state: LookupResult<()> = LookupResult::new(Id::from_bytes([9u8; 32]));
        let self_id = Id::from_bytes([0u8; 32]);
        let a = peer_addr(1);
        let b = peer_addr(2);
        state.add_peers(&self_id, vec![a.clone(), b.clone()]);
        assert_eq!(state.unqueried_len(), 2);
        // re-adding the same peers changes nothing
        state.add_peers(&self_id, vec![a.clone(), b.clone()]);
        assert_eq!(state.unqueried_len(), 2);
        // a peer already responded is not re-queued
        state.responded.insert(a.id, a.clone());
        let c = peer_addr(3);
        state.add_peers(&self_id, vec![a, c]);
        assert_eq!(state.unqueried_len(), 3);
    }
}
