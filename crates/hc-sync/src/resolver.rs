use std::time::Duration;

use futures::future::join_all;
use hc_blockchain::{Blockchain, Difficulty};
use serde::{Deserialize, Serialize};
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

use crate::{ChainFetcher, ConsensusRule, Peer, PeerError, SyncError};

/// Timing and acceptance settings for a resolution round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Upper bound on a single peer's answer.
    pub peer_timeout: Duration,

    /// Upper bound on the whole round, measured from its start.
    pub overall_deadline: Duration,

    pub rule: ConsensusRule,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            peer_timeout: Duration::from_secs(5),
            overall_deadline: Duration::from_secs(15),
            rule: ConsensusRule::default(),
        }
    }
}

/// A peer chain that survived decoding and the consensus rule.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub peer: Peer,
    pub chain: Blockchain,
}

/// A peer that contributed nothing, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerFailure {
    pub address: String,
    pub reason: String,
    #[serde(skip)]
    pub error: Option<PeerError>,
}

impl PeerFailure {
    fn new(peer: &Peer, error: PeerError) -> Self {
        Self {
            address: peer.address.clone(),
            reason: error.to_string(),
            error: Some(error),
        }
    }
}

/// Outcome of querying every peer once.
#[derive(Debug, Clone)]
pub struct Resolution {
    /// The longest admitted chain; ties go to the earliest-registered peer.
    pub winner: Candidate,

    /// Per-peer failures in registration order.
    pub failures: Vec<PeerFailure>,

    /// Number of peers whose chain was admitted.
    pub admitted: usize,
}

/// Queries all peers concurrently and reduces their answers to at most one
/// replacement candidate.
///
/// Answers are collected in full before any decision is made, so the result
/// does not depend on which peer replies first.
pub struct Resolver<F> {
    fetcher: F,
    config: ResolverConfig,
    difficulty: Difficulty,
}

impl<F: ChainFetcher> Resolver<F> {
    pub fn new(fetcher: F, config: ResolverConfig, difficulty: Difficulty) -> Self {
        Self {
            fetcher,
            config,
            difficulty,
        }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Run one round against `peers`.
    ///
    /// Fails with [`SyncError::NoPeersResolved`] when no peer produced an
    /// admissible chain.  Individual peer failures are otherwise reported in
    /// [`Resolution::failures`].
    pub async fn resolve(&self, peers: &[Peer]) -> Result<Resolution, SyncError> {
        let started = Instant::now();
        let round_deadline = started + self.config.overall_deadline;

        let queries = peers.iter().map(|peer| {
            let peer_deadline = (started + self.config.peer_timeout).min(round_deadline);
            let allowed = peer_deadline.saturating_duration_since(started);
            async move {
                match timeout_at(peer_deadline, self.fetcher.fetch_chain(peer)).await {
                    Ok(result) => result,
                    Err(_) => Err(PeerError::Timeout(allowed)),
                }
            }
        });
        let answers = join_all(queries).await;
        let screened = self.screen(answers).await?;

        let mut winner: Option<Candidate> = None;
        let mut failures = Vec::new();
        let mut admitted = 0;

        for (peer, answer) in peers.iter().zip(screened) {
            let chain = match answer {
                Ok(chain) => chain,
                Err(e) => {
                    warn!(peer = %peer.address, error = %e, "peer dropped from resolution");
                    failures.push(PeerFailure::new(peer, e));
                    continue;
                }
            };

            debug!(peer = %peer.address, length = chain.len(), "peer chain admitted");
            admitted += 1;

            let longer = winner
                .as_ref()
                .map_or(true, |best| chain.len() > best.chain.len());
            if longer {
                winner = Some(Candidate {
                    peer: peer.clone(),
                    chain,
                });
            }
        }

        let Some(winner) = winner else {
            return Err(SyncError::NoPeersResolved { failures });
        };

        info!(
            peers = peers.len(),
            admitted,
            failed = failures.len(),
            best = winner.chain.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "resolution round complete"
        );

        Ok(Resolution {
            winner,
            failures,
            admitted,
        })
    }

    /// Apply the consensus rule to every answer on the blocking pool; full
    /// validation rehashes every block.
    async fn screen(
        &self,
        answers: Vec<Result<Blockchain, PeerError>>,
    ) -> Result<Vec<Result<Blockchain, PeerError>>, SyncError> {
        let rule = self.config.rule;
        let difficulty = self.difficulty.clone();

        tokio::task::spawn_blocking(move || {
            answers
                .into_iter()
                .map(|answer| -> Result<Blockchain, PeerError> {
                    let chain = answer?;
                    rule.admit(&chain, &difficulty)?;
                    Ok(chain)
                })
                .collect::<Vec<_>>()
        })
        .await
        .map_err(|e| SyncError::Worker(e.to_string()))
    }
}
