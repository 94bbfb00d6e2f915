//! Peer records and their liveness/response statistics (spec C2).

use std::cmp::Ordering;
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::id::Id;

/// The RPCs a peer can be contacted for; also the dimension `Stats` partitions on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Endpoint {
    Introduce,
    Find,
    Verify,
    Get,
    Put,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Request,
    Response,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    Success,
    Error,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Counter {
    pub count: u64,
    pub last_timestamp: u64,
}

/// Monotonic counters partitioned as {endpoint} × {Request|Response} × {Success|Error}.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Stats {
    counters: HashMap<(Endpoint, Direction, Outcome), Counter>,
}

impl Stats {
    pub fn record(&mut self, endpoint: Endpoint, direction: Direction, outcome: Outcome) {
        let entry = self.counters.entry((endpoint, direction, outcome)).or_default();
        entry.count += 1;
        entry.last_timestamp = now_unix();
    }

    pub fn get(&self, endpoint: Endpoint, direction: Direction, outcome: Outcome) -> Counter {
        self.counters.get(&(endpoint, direction, outcome)).copied().unwrap_or_default()
    }

    /// Total successful responses across all endpoints, the primary routing-preference signal.
    pub fn response_success_count(&self) -> u64 {
        self.counters
            .iter()
            .filter(|((_, dir, outcome), _)| *dir == Direction::Response && *outcome == Outcome::Success)
            .map(|(_, c)| c.count)
            .sum()
    }

    /// Most recent successful-response timestamp across all endpoints, or 0 if none.
    pub fn latest_response_success(&self) -> u64 {
        self.counters
            .iter()
            .filter(|((_, dir, outcome), _)| *dir == Direction::Response && *outcome == Outcome::Success)
            .map(|(_, c)| c.last_timestamp)
            .max()
            .unwrap_or(0)
    }

    /// Preference key: peers with more successful responses are preferred; among ties, the
    /// peer whose most recent success is *older* is preferred (LRU-style aging rewards
    /// peers with a longer demonstrated track record over a newly-responsive one).
    pub fn preference_key(&self) -> (u64, std::cmp::Reverse<u64>) {
        (self.response_success_count(), std::cmp::Reverse(self.latest_response_success()))
    }
}

fn now_unix() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).expect("clock before epoch").as_secs()
}

/// A network address. Opaque to the core: the transport collaborator interprets it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address(pub String);

impl Address {
    pub fn new(s: impl Into<String>) -> Self {
        Address(s.into())
    }
}

/// Identity + network address + liveness/response counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Peer {
    pub id: Id,
    pub address: Address,
    pub stats: Stats,
}

impl Peer {
    pub fn new(id: Id, address: Address) -> Self {
        Peer { id, address, stats: Stats::default() }
    }

    pub fn record_request(&mut self, endpoint: Endpoint, outcome: Outcome) {
        self.stats.record(endpoint, Direction::Request, outcome);
    }

    pub fn record_response(&mut self, endpoint: Endpoint, outcome: Outcome) {
        self.stats.record(endpoint, Direction::Response, outcome);
    }

    /// Strict, total routing preference order: greater is more preferred.
    pub fn preference_cmp(&self, other: &Peer) -> Ordering {
        self.stats
            .preference_key()
            .cmp(&other.stats.preference_key())
            .then_with(|| self.id.cmp(&other.id))
    }
}
