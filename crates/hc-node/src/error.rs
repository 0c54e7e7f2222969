use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("blockchain error: {0}")]
    Blockchain(#[from] hc_blockchain::BlockchainError),

    #[error("sync error: {0}")]
    Sync(#[from] hc_sync::SyncError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("mining worker failed: {0}")]
    Worker(String),
}
