//! DHT core: identifiers, peer bookkeeping, the routing table, and the generic lookup
//! engine that Introduce/Search/Store specialize.

pub mod error;
pub mod finder;
pub mod id;
pub mod introduce_search_store;
pub mod lookup;
pub mod peer;
pub mod routing;

pub use error::{LibriError, Result};
pub use finder::{FindResponse, FindResult, Finder, PeerAddress, QueryError};
pub use id::Id;
pub use lookup::{LookupResult, LookupStatus, Parameters as LookupParameters, ResponseProcessor};
pub use peer::{Address, Direction, Endpoint, Outcome, Peer, Stats};
pub use routing::RoutingTable;
