use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::{block::Block, error::BlockchainError, Difficulty, Miner, GENESIS_PREVIOUS_HASH};

/// The append-only chain of mined [`Block`]s held by a node.
///
/// Invariants maintained for chains built through [`Blockchain::add_block`]:
/// - The genesis block's `previous_hash` is `"0"`.
/// - Every other block's `previous_hash` is the hash of the block before it.
/// - Block indices equal their position in the chain.
///
/// Chains received from peers carry no such guarantee until
/// [`Blockchain::validate`] has accepted them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Blockchain {
    blocks: Vec<Block>,
}

impl Blockchain {
    /// An empty chain.  The genesis block is mined by the first
    /// [`Blockchain::add_block`] or [`Blockchain::head`] call.
    pub fn new() -> Self {
        Self { blocks: Vec::new() }
    }

    /// A chain seeded by mining `genesis`.
    pub fn with_genesis(
        genesis: Block,
        miner: &Miner,
        cancel: &CancellationToken,
    ) -> Result<Self, BlockchainError> {
        let mut chain = Self::new();
        chain.add_block(genesis, miner, cancel)?;
        Ok(chain)
    }

    /// Number of blocks in the chain (including genesis).
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// The most recent block, if any.  Never mines.
    pub fn tip(&self) -> Option<&Block> {
        self.blocks.last()
    }

    /// The most recent block.  An empty chain first mines and appends a
    /// default genesis block, so this call may run a proof-of-work search.
    pub fn head(
        &mut self,
        miner: &Miner,
        cancel: &CancellationToken,
    ) -> Result<&Block, BlockchainError> {
        if self.blocks.is_empty() {
            return self.add_block(Block::pending(), miner, cancel);
        }
        self.blocks.last().ok_or(BlockchainError::Empty)
    }

    /// Mine `pending` against the current tail (or as genesis when the chain
    /// is empty) and append it.
    ///
    /// This is the only way a chain grows block by block.
    pub fn add_block(
        &mut self,
        mut pending: Block,
        miner: &Miner,
        cancel: &CancellationToken,
    ) -> Result<&Block, BlockchainError> {
        let index = self.blocks.len() as u64;
        miner.mine(&mut pending, self.blocks.last(), index, cancel)?;
        self.blocks.push(pending);
        self.blocks.last().ok_or(BlockchainError::Empty)
    }

    /// Return a reference to a block by its index.
    pub fn get_block(&self, index: u64) -> Option<&Block> {
        self.blocks.get(index as usize)
    }

    /// All blocks in the chain.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Validate the full chain:
    /// - Genesis links to `"0"` and sits at index 0.
    /// - Every block sits at its own position and links to its predecessor.
    /// - Every block's hash matches its contents and meets `difficulty`.
    pub fn validate(&self, difficulty: &Difficulty) -> Result<(), BlockchainError> {
        let genesis = self
            .blocks
            .first()
            .ok_or_else(|| BlockchainError::InvalidChain("chain is empty".into()))?;
        if genesis.previous_hash() != Some(GENESIS_PREVIOUS_HASH) {
            return Err(BlockchainError::InvalidChain(
                "genesis block does not link to \"0\"".into(),
            ));
        }

        for (position, block) in self.blocks.iter().enumerate() {
            if block.index() != position as u64 {
                return Err(BlockchainError::InvalidChain(format!(
                    "block at position {position} has index {}",
                    block.index()
                )));
            }
            block.validate(difficulty)?;
        }

        for window in self.blocks.windows(2) {
            let prev = &window[0];
            let next = &window[1];

            if next.previous_hash() != prev.hash() {
                return Err(BlockchainError::InvalidChain(format!(
                    "block {} does not link to block {}",
                    next.index(),
                    prev.index()
                )));
            }
        }

        Ok(())
    }

    pub fn is_valid(&self, difficulty: &Difficulty) -> bool {
        self.validate(difficulty).is_ok()
    }

    /// Replace the local blocks with `candidate`'s if it is strictly longer.
    ///
    /// Length is the only criterion here; callers that do not trust the
    /// candidate must [`Blockchain::validate`] it first.
    pub fn replace_if_longer(&mut self, candidate: Blockchain) -> bool {
        if candidate.len() > self.len() {
            self.blocks = candidate.blocks;
            true
        } else {
            false
        }
    }
}
