use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BlockchainError {
    #[error("chain is empty")]
    Empty,

    #[error("invalid chain: {0}")]
    InvalidChain(String),

    #[error("invalid difficulty prefix {0:?}: expected lowercase hex digits")]
    InvalidDifficulty(String),

    #[error("block has already been mined")]
    AlreadyMined,

    #[error("no nonce found after {attempts} attempts")]
    AttemptsExhausted { attempts: u64 },

    #[error("mining deadline exceeded after {elapsed:?}")]
    MiningTimeout { elapsed: Duration },

    #[error("mining cancelled")]
    MiningCancelled,

    #[error("transaction error: {0}")]
    Transaction(#[from] hc_transaction::TransactionError),
}
