use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use hc_blockchain::Blockchain;
use reqwest::Client;

use crate::{
    protocol::{chain_url, decode_chain},
    Peer, PeerError, SyncError,
};

/// Retrieves a peer's full chain.
///
/// The resolver applies its own timeouts around every call, so
/// implementations do not need to bound their own latency.
#[async_trait]
pub trait ChainFetcher: Send + Sync {
    async fn fetch_chain(&self, peer: &Peer) -> Result<Blockchain, PeerError>;
}

#[async_trait]
impl<T: ChainFetcher + ?Sized> ChainFetcher for Arc<T> {
    async fn fetch_chain(&self, peer: &Peer) -> Result<Blockchain, PeerError> {
        (**self).fetch_chain(peer).await
    }
}

/// Fetches chains over HTTP from `http://{address}/blockchain`.
#[derive(Debug, Clone)]
pub struct HttpChainFetcher {
    client: Client,
}

impl HttpChainFetcher {
    /// `timeout` bounds each request at the HTTP layer as well.
    pub fn new(timeout: Duration) -> Result<Self, SyncError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ChainFetcher for HttpChainFetcher {
    async fn fetch_chain(&self, peer: &Peer) -> Result<Blockchain, PeerError> {
        let url = chain_url(peer);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| PeerError::Unreachable(format!("{url}: {e}")))?;

        let body = response
            .bytes()
            .await
            .map_err(|e| PeerError::Unreachable(format!("{url}: {e}")))?;

        decode_chain(&body).map_err(|e| PeerError::Decode(e.to_string()))
    }
}
