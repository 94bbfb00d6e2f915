//! The XOR-space routing table: buckets covering the ID space, split-on-fill, with an
//! eviction policy that never drops a live peer until it fails a health probe (spec C3).

use std::collections::HashMap;

use crate::id::{Id, ID_BITS};
use crate::peer::Peer;

/// Default bucket capacity (Kademlia's "K").
pub const DEFAULT_K: usize = 20;

/// Outcome of a [`RoutingTable::push`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushResult {
    Added,
    AlreadyPresent,
    /// The peer's bucket was full and did not contain the local ID, so it was dropped.
    /// The caller may health-probe the bucket's least-preferred peer and retry.
    Dropped,
}

/// A bucket covers every ID whose first `prefix_len` bits match `prefix`'s. Buckets form a
/// binary trie rooted at the whole ID space; only the bucket containing the local ID ever
/// splits, so every other bucket's `prefix_len` equals its peers' common-prefix-length with
/// the local ID (the spec's `depth`).
#[derive(Debug, Clone)]
struct Bucket {
    prefix: Id,
    prefix_len: u32,
    peers: Vec<Peer>,
}

impl Bucket {
    fn root() -> Self {
        Bucket { prefix: Id::ZERO, prefix_len: 0, peers: Vec::new() }
    }

    fn contains(&self, id: &Id) -> bool {
        id.cpl(&self.prefix) >= self.prefix_len
    }

    fn contains_self(&self, local_id: &Id) -> bool {
        self.contains(local_id)
    }

    fn position(&self, id: &Id) -> Option<usize> {
        self.peers.iter().position(|p| &p.id == id)
    }

    /// The least-preferred peer's index, for eviction-on-probe-failure.
    fn least_preferred_index(&self) -> Option<usize> {
        self.peers
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| a.preference_cmp(b))
            .map(|(i, _)| i)
    }

    fn split(&self) -> (Bucket, Bucket) {
        let new_len = self.prefix_len + 1;
        let mut zero = Bucket { prefix: self.prefix.with_bit(self.prefix_len, false), prefix_len: new_len, peers: Vec::new() };
        let mut one = Bucket { prefix: self.prefix.with_bit(self.prefix_len, true), prefix_len: new_len, peers: Vec::new() };
        for peer in &self.peers {
            if peer.id.bit(self.prefix_len) {
                one.peers.push(peer.clone());
            } else {
                zero.peers.push(peer.clone());
            }
        }
        (zero, one)
    }
}

/// Ordered list of disjoint buckets partitioning the full 256-bit space, plus a flat
/// peer index for O(1) membership lookups.
pub struct RoutingTable {
    self_id: Id,
    k: usize,
    buckets: Vec<Bucket>,
    index: HashMap<Id, usize>,
}

impl RoutingTable {
    pub fn new(self_id: Id) -> Self {
        Self::with_k(self_id, DEFAULT_K)
    }

    pub fn with_k(self_id: Id, k: usize) -> Self {
        RoutingTable { self_id, k, buckets: vec![Bucket::root()], index: HashMap::new() }
    }

    pub fn self_id(&self) -> Id {
        self.self_id
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn num_peers(&self) -> usize {
        self.index.len()
    }

    pub fn num_buckets(&self) -> usize {
        self.buckets.len()
    }

    fn bucket_index_for(&self, id: &Id) -> usize {
        self.buckets
            .iter()
            .position(|b| b.contains(id))
            .expect("buckets partition the entire ID space")
    }

    /// Inserts or updates `peer`. See spec §4.2 for the exact state machine.
    pub fn push(&mut self, peer: Peer) -> PushResult {
        if peer.id == self.self_id {
            // the local node is never itself a routable peer
            return PushResult::Dropped;
        }
        let bi = self.bucket_index_for(&peer.id);
        if let Some(pi) = self.buckets[bi].position(&peer.id) {
            self.buckets[bi].peers[pi] = peer;
            return PushResult::AlreadyPresent;
        }
        if self.buckets[bi].peers.len() < self.k {
            self.buckets[bi].peers.push(peer);
            self.index.insert(self.buckets[bi].peers.last().unwrap().id, bi);
            return PushResult::Added;
        }
        if self.buckets[bi].contains_self(&self.self_id) {
            let (zero, one) = self.buckets[bi].split();
            self.buckets.splice(bi..=bi, [zero, one]);
            self.reindex();
            return self.push(peer);
        }
        PushResult::Dropped
    }

    /// Removes and returns the peer with `peer_id`, if present.
    pub fn pop(&mut self, peer_id: &Id) -> Option<Peer> {
        let bi = *self.index.get(peer_id)?;
        let pi = self.buckets[bi].position(peer_id)?;
        let peer = self.buckets[bi].peers.remove(pi);
        self.reindex();
        Some(peer)
    }

    /// Up to `n` peers closest to `target` by XOR distance, across all buckets, tie-broken
    /// by peer-ID lexicographic order.
    pub fn peak(&self, target: &Id, n: usize) -> Vec<Peer> {
        let mut all: Vec<&Peer> = self.buckets.iter().flat_map(|b| b.peers.iter()).collect();
        all.sort_by(|a, b| {
            let da = target.distance(&a.id);
            let db = target.distance(&b.id);
            da.cmp(&db).then_with(|| a.id.cmp(&b.id))
        });
        all.into_iter().take(n).cloned().collect()
    }

    /// The least-preferred peer in the bucket that would receive `id`, for the
    /// health-probe-then-retry eviction flow the spec describes for `Dropped` pushes.
    pub fn least_preferred_in_bucket_for(&self, id: &Id) -> Option<Id> {
        let bi = self.bucket_index_for(id);
        let li = self.buckets[bi].least_preferred_index()?;
        Some(self.buckets[bi].peers[li].id)
    }

    fn reindex(&mut self) {
        self.index.clear();
        for (bi, bucket) in self.buckets.iter().enumerate() {
            for peer in &bucket.peers {
                self.index.insert(peer.id, bi);
            }
        }
    }

    /// All peers currently held, for persistence (spec §4.2: bucket structure is not saved).
    pub fn all_peers(&self) -> Vec<Peer> {
        self.buckets.iter().flat_map(|b| b.peers.iter().cloned()).collect()
    }

    /// Rebuilds an empty table with `k` and re-inserts `peers`, deterministically
    /// reconstructing bucket shape from the current split policy rather than trusting a
    /// persisted layout.
    pub fn load(self_id: Id, k: usize, peers: Vec<Peer>) -> Self {
        let mut table = Self::with_k(self_id, k);
        for peer in peers {
            table.push(peer);
        }
        table
    }

    #[cfg(test)]
    fn assert_partitions_space(&self) {
        // every bucket's range is disjoint and together they cover the whole space: checked
        // by sampling random IDs and asserting exactly one bucket claims each (see tests).
        for b in &self.buckets {
            assert!(b.prefix_len <= ID_BITS);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peer::Address;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn rand_peer(rng: &mut ChaCha8Rng) -> Peer {
        let id = Id::random(rng);
        Peer::new(id, Address::new(format!("127.0.0.1:{}", 10000 + (rng.next_u32() % 1000) as u16)))
    }

    #[test]
    fn every_id_belongs_to_exactly_one_bucket() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let self_id = Id::random(&mut rng);
        let mut table = RoutingTable::new(self_id);
        for _ in 0..200 {
            table.push(rand_peer(&mut rng));
        }
        for _ in 0..500 {
            let probe = Id::random(&mut rng);
            let matches = table.buckets.iter().filter(|b| b.contains(&probe)).count();
            assert_eq!(matches, 1);
        }
        table.assert_partitions_space();
    }

    #[test]
    fn peer_set_matches_flat_index_after_pushes_and_pops() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let self_id = Id::random(&mut rng);
        let mut table = RoutingTable::new(self_id);
        let mut pushed = Vec::new();
        for _ in 0..50 {
            let p = rand_peer(&mut rng);
            pushed.push(p.id);
            table.push(p);
        }
        for id in pushed.iter().step_by(2) {
            table.pop(id);
        }
        let remaining: std::collections::HashSet<Id> = table.all_peers().into_iter().map(|p| p.id).collect();
        let expected: std::collections::HashSet<Id> = pushed.iter().skip(1).step_by(2).cloned().collect();
        assert_eq!(remaining, expected);
        assert_eq!(table.index.len(), remaining.len());
    }

    #[test]
    fn peak_is_sorted_by_distance_with_id_tiebreak() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let self_id = Id::random(&mut rng);
        let mut table = RoutingTable::new(self_id);
        for _ in 0..60 {
            table.push(rand_peer(&mut rng));
        }
        let target = Id::random(&mut rng);
        let closest = table.peak(&target, 10);
        for w in closest.windows(2) {
            let d0 = target.distance(&w[0].id);
            let d1 = target.distance(&w[1].id);
            assert!(d0 <= d1);
        }
    }

    #[test]
    fn repeated_splits_when_all_peers_share_the_same_prefix_as_self() {
        let self_id = Id::from_bytes([0u8; 32]);
        let mut table = RoutingTable::with_k(self_id, 4);
        // all peers differ from self only in the very last bit: CPL 255 with self, forcing
        // the self-containing bucket to split repeatedly down to the last bit.
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        for i in 0..20u8 {
            let mut bytes = [0u8; 32];
            bytes[31] = 1;
            // vary an early byte slightly so peers are distinct but still share CPL 255 sometimes
            bytes[0] = i;
            let _ = &mut rng;
            let id = Id::from_bytes(bytes);
            table.push(Peer::new(id, Address::new(format!("p{i}"))));
        }
        assert!(table.num_buckets() > 1);
    }

    #[test]
    fn full_bucket_not_containing_self_drops_new_peers() {
        let self_id = Id::from_bytes([0u8; 32]);
        let mut table = RoutingTable::with_k(self_id, 2);
        // fill a bucket far from self (high first bit) past capacity
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let mut results = Vec::new();
        for _ in 0..5 {
            let mut bytes = [0xffu8; 32];
            bytes[31] = (rng.next_u32() % 255) as u8;
            results.push(table.push(Peer::new(Id::from_bytes(bytes), Address::new("x"))));
        }
        assert!(results.iter().any(|r| *r == PushResult::Dropped));
    }

    #[test]
    fn push_of_200_random_peers_bounds_buckets_and_peer_count() {
        let mut rng = ChaCha8Rng::seed_from_u64(6);
        let self_id = Id::random(&mut rng);
        let mut table = RoutingTable::new(self_id);
        for _ in 0..200 {
            table.push(rand_peer(&mut rng));
        }
        assert!(table.num_buckets() <= 256);
        assert!(table.num_peers() <= 200);
    }

    #[test]
    fn save_load_round_trip_preserves_peer_set() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let self_id = Id::random(&mut rng);
        let mut table = RoutingTable::new(self_id);
        for _ in 0..30 {
            table.push(rand_peer(&mut rng));
        }
        let saved_peers = table.all_peers();
        let reloaded = RoutingTable::load(self_id, table.k(), saved_peers.clone());
        let a: std::collections::HashSet<Id> = saved_peers.iter().map(|p| p.id).collect();
        let b: std::collections::HashSet<Id> = reloaded.all_peers().iter().map(|p| p.id).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn already_present_peer_updates_in_place_without_growing() {
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        let self_id = Id::random(&mut rng);
        let mut table = RoutingTable::new(self_id);
        let peer = rand_peer(&mut rng);
        assert_eq!(table.push(peer.clone()), PushResult::Added);
        let before = table.num_peers();
        assert_eq!(table.push(peer), PushResult::AlreadyPresent);
        assert_eq!(table.num_peers(), before);
    }
}
