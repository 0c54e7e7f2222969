use hc_transaction::Transaction;

/// High-level events emitted by a [`crate::Node`] that the embedding
/// application can subscribe to via a channel.
#[derive(Debug, Clone)]
pub enum NodeEvent {
    /// A transaction was attached to the pending block.
    TransactionQueued(Transaction),

    /// A block was mined and appended to the local chain.
    BlockMined { index: u64, hash: String },

    /// A proof-of-work search ended without a block.
    MiningFailed(String),

    /// A peer address was added to the registry.
    PeerRegistered(String),

    /// The local chain was replaced by a longer peer chain.
    ChainReplaced { new_length: usize, from: String },

    /// A resolution round produced no usable chain.
    ResolutionFailed(String),
}
