use std::time::Duration;

use thiserror::Error;

use crate::resolver::PeerFailure;

/// Why a single peer contributed nothing to a resolution round.  These are
/// collected, never propagated on their own.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PeerError {
    #[error("peer unreachable: {0}")]
    Unreachable(String),

    #[error("peer did not answer within {0:?}")]
    Timeout(Duration),

    #[error("could not decode peer chain: {0}")]
    Decode(String),

    #[error("peer chain rejected: {0}")]
    InvalidChain(String),
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("invalid peer address {0:?}")]
    InvalidPeerAddress(String),

    #[error("no peer produced a usable chain ({} failures)", failures.len())]
    NoPeersResolved { failures: Vec<PeerFailure> },

    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("blockchain error: {0}")]
    Blockchain(#[from] hc_blockchain::BlockchainError),

    #[error("chain screening worker failed: {0}")]
    Worker(String),
}
