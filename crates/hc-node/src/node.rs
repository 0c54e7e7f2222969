use std::{
    future::Future,
    sync::{Arc, Mutex as StdMutex, PoisonError},
    time::Duration,
};

use hc_blockchain::{Block, Blockchain, BlockchainError, Miner};
use hc_sync::{
    Candidate, ChainFetcher, HttpChainFetcher, Peer, PeerFailure, PeerRegistry, Resolver,
};
use hc_transaction::Transaction;
use serde::Serialize;
use tokio::sync::{mpsc, Mutex, OwnedMutexGuard, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{config::NodeConfig, error::NodeError, event::NodeEvent};

/// Result of [`Node::resolve`] as reported back to callers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionReport {
    /// Whether the local chain was replaced.
    pub replaced: bool,

    /// Local chain length after the round.
    pub length: usize,

    /// Address of the peer whose chain was adopted.
    pub adopted_from: Option<String>,

    /// Peers that contributed nothing, with reasons.
    pub failures: Vec<PeerFailure>,
}

/// The ledger node: one authoritative chain plus the state around it.
///
/// Constructed once at process start and shared (typically as `Arc<Node>`)
/// with whatever handles inbound requests.  Torn down with
/// [`Node::shutdown`], which also stops any in-flight mining.
///
/// All chain mutations, appending a mined block and adopting a peer chain,
/// take the same chain lock.  Mining holds it for the entire nonce search so
/// the tail cannot move underneath the miner.
pub struct Node {
    worker: ChainWorker,
    peers: RwLock<PeerRegistry>,
    resolver: Resolver<Arc<dyn ChainFetcher>>,
    preempt_mining_on_resolve: bool,
}

impl Node {
    /// Create a node that fetches peer chains over HTTP.
    ///
    /// Returns the node together with a receiver for [`NodeEvent`]s that the
    /// calling application can process independently.
    pub fn new(
        config: NodeConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<NodeEvent>), NodeError> {
        let fetcher = HttpChainFetcher::new(config.resolver.peer_timeout)?;
        Self::with_fetcher(config, Arc::new(fetcher))
    }

    /// Create a node with a custom [`ChainFetcher`].
    pub fn with_fetcher(
        config: NodeConfig,
        fetcher: Arc<dyn ChainFetcher>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<NodeEvent>), NodeError> {
        let mut peers = PeerRegistry::new();
        for address in &config.bootstrap_peers {
            peers.register(address)?;
        }

        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let node = Self {
            worker: ChainWorker {
                chain: Arc::new(Mutex::new(Blockchain::new())),
                pending: Arc::new(Mutex::new(Block::pending())),
                active_mining: Arc::new(StdMutex::new(None)),
                miner: Miner::new(config.difficulty.clone(), config.mining.clone()),
                shutdown: CancellationToken::new(),
                event_tx,
            },
            peers: RwLock::new(peers),
            resolver: Resolver::new(fetcher, config.resolver.clone(), config.difficulty),
            preempt_mining_on_resolve: config.preempt_mining_on_resolve,
        };

        Ok((node, event_rx))
    }

    /// Snapshot of the local chain.
    pub async fn chain(&self) -> Blockchain {
        self.worker.chain.lock().await.clone()
    }

    /// Snapshot of the block currently collecting transactions.
    pub async fn pending(&self) -> Block {
        self.worker.pending.lock().await.clone()
    }

    /// The last block of the chain.  On an empty chain this mines and appends
    /// a default genesis block first.
    pub async fn head(&self) -> Result<Block, NodeError> {
        if let Some(tip) = self.worker.chain.lock().await.tip() {
            return Ok(tip.clone());
        }
        let worker = self.worker.clone();
        detach(async move {
            let chain = Arc::clone(&worker.chain).lock_owned().await;
            worker
                .search(chain, |chain, miner, cancel| chain.head(miner, cancel).cloned())
                .await
        })
        .await
    }

    /// Attach `tx` to the pending block and return a snapshot of it.
    pub async fn submit_transaction(&self, tx: Transaction) -> Result<Block, NodeError> {
        let mut pending = self.worker.pending.lock().await;
        pending.attach(tx.clone())?;
        debug!(from = %tx.from, to = %tx.to, amount = tx.amount, "transaction queued");
        self.worker.emit(NodeEvent::TransactionQueued(tx));
        Ok(pending.clone())
    }

    /// Mine the pending block onto the chain and start a fresh pending block.
    ///
    /// The work runs as its own task: if the caller stops waiting, the block
    /// is still either committed or its transactions put back at the front
    /// of the pending block.
    pub async fn mine_pending(&self) -> Result<Block, NodeError> {
        detach(self.worker.clone().mine_pending()).await
    }

    /// Add `address` to the peer registry.
    pub async fn register_peer(&self, address: &str) -> Result<Peer, NodeError> {
        let peer = self.peers.write().await.register(address)?;
        info!(peer = %peer.address, "Registered peer");
        self.worker.emit(NodeEvent::PeerRegistered(peer.address.clone()));
        Ok(peer)
    }

    /// Registered peers in registration order.
    pub async fn peers(&self) -> Vec<Peer> {
        self.peers.read().await.all().to_vec()
    }

    /// Query every registered peer and adopt the longest admissible chain if
    /// it is strictly longer than the local one.
    ///
    /// At most one replacement is applied per round.  Fails only when no peer
    /// produced a usable chain.
    pub async fn resolve(&self) -> Result<ResolutionReport, NodeError> {
        let peers = self.peers().await;

        let resolution = match self.resolver.resolve(&peers).await {
            Ok(resolution) => resolution,
            Err(e) => {
                warn!(error = %e, "resolution failed");
                self.worker.emit(NodeEvent::ResolutionFailed(e.to_string()));
                return Err(e.into());
            }
        };

        if self.preempt_mining_on_resolve && self.cancel_mining() {
            debug!("pre-empted in-flight mining for resolution");
        }

        let Candidate { peer, chain: candidate } = resolution.winner;
        let (replaced, length) = {
            let mut chain = self.worker.chain.lock().await;
            let replaced = chain.replace_if_longer(candidate);
            (replaced, chain.len())
        };

        if replaced {
            info!(new_length = length, from = %peer.address, "Chain replaced by longer peer chain");
            self.worker.emit(NodeEvent::ChainReplaced {
                new_length: length,
                from: peer.address.clone(),
            });
        } else {
            debug!(length, "local chain kept");
        }

        Ok(ResolutionReport {
            replaced,
            length,
            adopted_from: replaced.then_some(peer.address),
            failures: resolution.failures,
        })
    }

    /// Cancel the proof-of-work search currently running, if any.  Returns
    /// `true` when a search was signalled.
    pub fn cancel_mining(&self) -> bool {
        match self.worker.active_slot().as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Whether a proof-of-work search currently holds the chain.
    pub fn is_mining(&self) -> bool {
        self.worker.active_slot().is_some()
    }

    /// Stop the node: cancels in-flight mining and ends
    /// [`Node::run_periodic_resolution`].
    pub fn shutdown(&self) {
        self.worker.shutdown.cancel();
    }

    /// A token that is cancelled when [`Node::shutdown`] is called.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.worker.shutdown.clone()
    }

    /// Run a resolution round every `interval` until shutdown.
    pub async fn run_periodic_resolution(&self, interval: Duration) {
        use tokio::time;

        let mut ticker = time::interval(interval);
        // Skip ticks missed while a round was running.
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Skip);
        // The first tick fires immediately; resolve after one full interval.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = self.worker.shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.resolve().await {
                        debug!(error = %e, "periodic resolution produced no chain");
                    }
                }
            }
        }
    }
}

/// Run `job` as its own task so that dropping the awaiting future does not
/// abandon it midway.
async fn detach<T, J>(job: J) -> Result<T, NodeError>
where
    T: Send + 'static,
    J: Future<Output = Result<T, NodeError>> + Send + 'static,
{
    tokio::spawn(job)
        .await
        .map_err(|e| NodeError::Worker(e.to_string()))?
}

type SearchSlot = Arc<StdMutex<Option<CancellationToken>>>;

/// Handles to the chain-side state, cheap to clone into detached tasks.
#[derive(Clone)]
struct ChainWorker {
    chain: Arc<Mutex<Blockchain>>,
    pending: Arc<Mutex<Block>>,
    /// Token of the search currently holding the chain lock, if any.
    active_mining: SearchSlot,
    miner: Miner,
    shutdown: CancellationToken,
    event_tx: mpsc::UnboundedSender<NodeEvent>,
}

impl ChainWorker {
    fn emit(&self, event: NodeEvent) {
        let _ = self.event_tx.send(event);
    }

    fn active_slot(&self) -> std::sync::MutexGuard<'_, Option<CancellationToken>> {
        self.active_mining
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    async fn mine_pending(self) -> Result<Block, NodeError> {
        let chain = Arc::clone(&self.chain).lock_owned().await;
        // Taken only once the tail is held, so transactions queued behind
        // another search stay in the pending block.
        let block = std::mem::take(&mut *self.pending.lock().await);
        let transactions = block.transactions().to_vec();

        match self
            .search(chain, move |chain, miner, cancel| {
                chain.add_block(block, miner, cancel).cloned()
            })
            .await
        {
            Ok(mined) => {
                let hash = mined.hash().unwrap_or_default().to_string();
                info!(
                    index = mined.index(),
                    nonce = mined.nonce(),
                    hash = %hash,
                    transactions = mined.transactions().len(),
                    "Mined block #{}",
                    mined.index()
                );
                self.emit(NodeEvent::BlockMined {
                    index: mined.index(),
                    hash,
                });
                Ok(mined)
            }
            Err(e) => {
                warn!(error = %e, "mining failed, restoring pending transactions");
                self.restore_pending(transactions).await;
                self.emit(NodeEvent::MiningFailed(e.to_string()));
                Err(e)
            }
        }
    }

    /// Run a chain operation that may mine, on the blocking pool, while
    /// holding `chain`.
    async fn search<T, F>(
        &self,
        mut chain: OwnedMutexGuard<Blockchain>,
        op: F,
    ) -> Result<T, NodeError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Blockchain, &Miner, &CancellationToken) -> Result<T, BlockchainError>
            + Send
            + 'static,
    {
        let cancel = self.shutdown.child_token();
        let active = ActiveSearch::register(&self.active_mining, cancel.clone());
        let miner = self.miner.clone();

        let (chain, result) = tokio::task::spawn_blocking(move || {
            let result = op(&mut *chain, &miner, &cancel);
            // Deregister while the chain is still held so the next search's
            // token is never cleared.
            drop(active);
            (chain, result)
        })
        .await
        .map_err(|e| NodeError::Worker(e.to_string()))?;
        drop(chain);

        Ok(result?)
    }

    async fn restore_pending(&self, transactions: Vec<Transaction>) {
        let mut pending = self.pending.lock().await;
        let mut restored = Block::pending();
        for tx in transactions
            .into_iter()
            .chain(pending.transactions().iter().cloned())
        {
            if let Err(e) = restored.attach(tx) {
                warn!(error = %e, "could not restore pending transaction");
            }
        }
        *pending = restored;
    }
}

/// An entry in the active-search slot, cleared when dropped.
struct ActiveSearch(SearchSlot);

impl ActiveSearch {
    fn register(slot: &SearchSlot, token: CancellationToken) -> Self {
        *slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(token);
        Self(Arc::clone(slot))
    }
}

impl Drop for ActiveSearch {
    fn drop(&mut self) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node() -> Node {
        let fetcher = HttpChainFetcher::new(Duration::from_millis(200)).unwrap();
        Node::with_fetcher(NodeConfig::default(), Arc::new(fetcher))
            .unwrap()
            .0
    }

    #[tokio::test]
    async fn head_creates_genesis_once() {
        let node = node();
        let first = node.head().await.unwrap();
        let second = node.head().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(node.chain().await.len(), 1);
    }

    #[tokio::test]
    async fn mining_resets_pending_block() {
        let node = node();
        node.submit_transaction(Transaction::new("A", "B", 1.0))
            .await
            .unwrap();
        let mined = node.mine_pending().await.unwrap();
        assert_eq!(mined.transactions().len(), 1);
        assert!(node.pending().await.transactions().is_empty());
        assert!(!node.is_mining());
    }

    #[tokio::test]
    async fn cancel_without_active_search_is_noop() {
        let node = node();
        assert!(!node.is_mining());
        assert!(!node.cancel_mining());
    }

    #[test]
    fn active_search_clears_slot_on_drop() {
        let slot: SearchSlot = Arc::new(StdMutex::new(None));
        let active = ActiveSearch::register(&slot, CancellationToken::new());
        assert!(slot.lock().unwrap().is_some());
        drop(active);
        assert!(slot.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn bootstrap_peers_are_registered() {
        let config = NodeConfig {
            bootstrap_peers: vec!["a:1".into(), "b:1".into(), "a:1".into()],
            ..NodeConfig::default()
        };
        let fetcher = HttpChainFetcher::new(Duration::from_millis(200)).unwrap();
        let (node, _events) = Node::with_fetcher(config, Arc::new(fetcher)).unwrap();
        assert_eq!(node.peers().await.len(), 2);
    }
}
