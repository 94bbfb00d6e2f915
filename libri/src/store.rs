//! The on-disk key-value contract (spec §6): out of scope to implement durably here, but
//! the core depends on exactly this shape, so an in-memory stand-in lives alongside it.

use std::collections::HashMap;
use std::sync::RwLock;

/// Namespaces the node partitions its key space into.
pub const NS_DOCUMENTS: &str = "documents";
pub const NS_ROUTING: &str = "routing";
pub const NS_PEER_STATS: &str = "peer_stats";

pub trait KvStore: Send + Sync {
    fn put(&self, ns: &str, key: &[u8], bytes: Vec<u8>);
    fn get(&self, ns: &str, key: &[u8]) -> Option<Vec<u8>>;
    fn iterate(&self, ns: &str) -> Vec<(Vec<u8>, Vec<u8>)>;
}

/// A process-lifetime store. Real deployments back this with the on-disk store named in
/// the spec's external-interfaces section; this node ships only the contract and this
/// fixture so the rest of the crate never depends on a concrete storage engine.
#[derive(Default)]
pub struct InMemoryStore {
    namespaces: RwLock<HashMap<String, HashMap<Vec<u8>, Vec<u8>>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for InMemoryStore {
    fn put(&self, ns: &str, key: &[u8], bytes: Vec<u8>) {
        let mut guard = self.namespaces.write().expect("store lock poisoned");
        guard.entry(ns.to_string()).or_default().insert(key.to_vec(), bytes);
    }

    fn get(&self, ns: &str, key: &[u8]) -> Option<Vec<u8>> {
        let guard = self.namespaces.read().expect("store lock poisoned");
        guard.get(ns).and_then(|m| m.get(key)).cloned()
    }

    fn iterate(&self, ns: &str) -> Vec<(Vec<u8>, Vec<u8>)> {
        let guard = self.namespaces.read().expect("store lock poisoned");
        guard.get(ns).map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_round_trips() {
        let store = InMemoryStore::new();
        store.put(NS_DOCUMENTS, b"key1", vec![1, 2, 3]);
        assert_eq!(store.get(NS_DOCUMENTS, b"key1"), Some(vec![1, 2, 3]));
    }

    #[test]
    fn namespaces_are_isolated() {
        let store = InMemoryStore::new();
        store.put(NS_DOCUMENTS, b"k", vec![1]);
        assert_eq!(store.get(NS_ROUTING, b"k"), None);
    }

    #[test]
    fn iterate_lists_everything_in_a_namespace() {
        let store = InMemoryStore::new();
        store.put(NS_PEER_STATS, b"a", vec![1]);
        store.put(NS_PEER_STATS, b"b", vec![2]);
        assert_eq!(store.iterate(NS_PEER_STATS).len(), 2);
    }
}
