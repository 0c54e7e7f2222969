use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::{
    block::{hash_key, Block},
    BlockchainError, Difficulty, GENESIS_PREVIOUS_HASH,
};

/// How often (in attempts) the deadline is checked.  Cancellation is checked
/// on every attempt.
const DEADLINE_CHECK_INTERVAL: u64 = 256;

/// Bounds on a single proof-of-work search.  `None` disables that bound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MiningPolicy {
    pub max_attempts: Option<u64>,
    pub deadline: Option<Duration>,
}

impl Default for MiningPolicy {
    fn default() -> Self {
        Self {
            max_attempts: Some(10_000_000),
            deadline: Some(Duration::from_secs(60)),
        }
    }
}

impl MiningPolicy {
    /// No attempt cap and no deadline: only cancellation stops the search.
    pub fn unbounded() -> Self {
        Self {
            max_attempts: None,
            deadline: None,
        }
    }
}

/// Performs the nonce search for blocks being appended to a chain.
#[derive(Debug, Clone, Default)]
pub struct Miner {
    difficulty: Difficulty,
    policy: MiningPolicy,
}

impl Miner {
    pub fn new(difficulty: Difficulty, policy: MiningPolicy) -> Self {
        Self { difficulty, policy }
    }

    pub fn difficulty(&self) -> &Difficulty {
        &self.difficulty
    }

    pub fn policy(&self) -> &MiningPolicy {
        &self.policy
    }

    /// Link `block` at `index` behind `previous` (or as genesis when `None`)
    /// and search nonces upward from 0 until its hash meets the difficulty.
    ///
    /// The search is CPU-bound and blocks the calling thread.  On any error
    /// the block is returned to its pending state.
    pub(crate) fn mine(
        &self,
        block: &mut Block,
        previous: Option<&Block>,
        index: u64,
        cancel: &CancellationToken,
    ) -> Result<(), BlockchainError> {
        if block.is_committed() {
            return Err(BlockchainError::AlreadyMined);
        }

        let previous_hash = match previous {
            None => GENESIS_PREVIOUS_HASH.to_string(),
            Some(prev) => prev
                .hash()
                .ok_or_else(|| {
                    BlockchainError::InvalidChain(format!("tail block {} is not mined", prev.index()))
                })?
                .to_string(),
        };
        block.link(index, previous_hash);

        match self.search(block, cancel) {
            Ok((nonce, hash)) => {
                block.set_nonce(nonce);
                block.commit(hash);
                Ok(())
            }
            Err(e) => {
                block.unlink();
                Err(e)
            }
        }
    }

    fn search(
        &self,
        block: &Block,
        cancel: &CancellationToken,
    ) -> Result<(u64, String), BlockchainError> {
        let stem = block.key_stem()?;
        let started = Instant::now();
        let mut nonce: u64 = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(BlockchainError::MiningCancelled);
            }
            if let Some(max) = self.policy.max_attempts {
                if nonce >= max {
                    return Err(BlockchainError::AttemptsExhausted { attempts: nonce });
                }
            }
            if nonce % DEADLINE_CHECK_INTERVAL == 0 {
                if let Some(deadline) = self.policy.deadline {
                    let elapsed = started.elapsed();
                    if elapsed >= deadline {
                        return Err(BlockchainError::MiningTimeout { elapsed });
                    }
                }
            }

            let hash = hash_key(&format!("{stem}{nonce}"));
            if self.difficulty.is_satisfied_by(&hash) {
                return Ok((nonce, hash));
            }
            nonce = nonce.checked_add(1).ok_or(BlockchainError::AttemptsExhausted {
                attempts: u64::MAX,
            })?;
        }
    }
}

#[cfg(test)]
mod tests {
    use hc_transaction::Transaction;

    use super::*;

    fn block_with(amount: f64) -> Block {
        let mut block = Block::pending_at("2018-08-10 12:00:00");
        block.attach(Transaction::new("A", "B", amount)).unwrap();
        block
    }

    #[test]
    fn genesis_links_to_sentinel() {
        let mut block = block_with(1.0);
        Miner::default()
            .mine(&mut block, None, 0, &CancellationToken::new())
            .unwrap();
        assert_eq!(block.previous_hash(), Some(GENESIS_PREVIOUS_HASH));
        assert!(block.hash().unwrap().starts_with("11"));
        assert_eq!(block.hash().unwrap(), block.compute_hash().unwrap());
        assert_eq!(block.status_message(), "block added to the chain");
    }

    #[test]
    fn search_is_deterministic_for_fixed_inputs() {
        let miner = Miner::default();
        let mut a = block_with(7.0);
        let mut b = block_with(7.0);
        miner.mine(&mut a, None, 0, &CancellationToken::new()).unwrap();
        miner.mine(&mut b, None, 0, &CancellationToken::new()).unwrap();
        assert_eq!(a.nonce(), b.nonce());
        assert_eq!(a.hash(), b.hash());
    }

    #[test]
    fn attempt_cap_returns_typed_error_and_resets_block() {
        // A five-digit prefix is practically unreachable in a single attempt.
        let miner = Miner::new(
            Difficulty::new("fffff").unwrap(),
            MiningPolicy {
                max_attempts: Some(1),
                deadline: None,
            },
        );
        let mut block = block_with(1.0);
        let err = miner
            .mine(&mut block, None, 0, &CancellationToken::new())
            .unwrap_err();
        assert!(matches!(err, BlockchainError::AttemptsExhausted { attempts: 1 }));
        assert!(!block.is_committed());
        assert!(block.previous_hash().is_none());
    }

    #[test]
    fn zero_deadline_times_out() {
        let miner = Miner::new(
            Difficulty::new("fffff").unwrap(),
            MiningPolicy {
                max_attempts: None,
                deadline: Some(Duration::ZERO),
            },
        );
        let mut block = block_with(1.0);
        let err = miner
            .mine(&mut block, None, 0, &CancellationToken::new())
            .unwrap_err();
        assert!(matches!(err, BlockchainError::MiningTimeout { .. }));
    }

    #[test]
    fn cancelled_token_stops_search() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut block = block_with(1.0);
        let err = Miner::default()
            .mine(&mut block, None, 0, &cancel)
            .unwrap_err();
        assert!(matches!(err, BlockchainError::MiningCancelled));
    }

    #[test]
    fn mining_a_committed_block_fails() {
        let miner = Miner::default();
        let mut block = block_with(1.0);
        miner.mine(&mut block, None, 0, &CancellationToken::new()).unwrap();
        assert!(matches!(
            miner.mine(&mut block, None, 0, &CancellationToken::new()),
            Err(BlockchainError::AlreadyMined)
        ));
    }
}
