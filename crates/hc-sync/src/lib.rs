pub mod error;
pub mod fetcher;
pub mod peer;
pub mod protocol;
pub mod resolver;
pub mod strategy;

pub use error::{PeerError, SyncError};
pub use fetcher::{ChainFetcher, HttpChainFetcher};
pub use peer::{Peer, PeerRegistry};
pub use resolver::{Candidate, PeerFailure, Resolution, Resolver, ResolverConfig};
pub use strategy::ConsensusRule;
