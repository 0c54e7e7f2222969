pub mod block;
pub mod blockchain;
pub mod difficulty;
pub mod error;
pub mod mining;

pub use block::Block;
pub use blockchain::Blockchain;
pub use difficulty::Difficulty;
pub use error::BlockchainError;
pub use mining::{Miner, MiningPolicy};

/// Identifies the digest and encoding used for block hashes.  Chains produced
/// under a different scheme will not validate against this one.
pub const HASH_SCHEME: &str = "sha256-hex/v1";

/// `previousHash` recorded on the genesis block.
pub const GENESIS_PREVIOUS_HASH: &str = "0";
