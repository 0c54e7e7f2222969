use std::{
    net::{Ipv4Addr, SocketAddr},
    time::Duration,
};

use hc_blockchain::{Difficulty, MiningPolicy};
use hc_sync::ResolverConfig;

/// Full configuration for a [`crate::Node`].
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// TCP port the HTTP API listens on.  Defaults to `8080`.
    pub port: u16,

    /// Hash prefix every block must carry.  Also used to validate peer
    /// chains.
    pub difficulty: Difficulty,

    /// Attempt cap and deadline for a single proof-of-work search.
    pub mining: MiningPolicy,

    /// Peer timeouts and consensus rule for resolution rounds.
    pub resolver: ResolverConfig,

    /// When `Some`, the binary runs a resolution round on this interval.
    pub resolve_interval: Option<Duration>,

    /// Cancel an in-flight proof-of-work search when a resolution round is
    /// ready to apply its result, instead of waiting for the search to end.
    pub preempt_mining_on_resolve: bool,

    /// Peer addresses registered at startup.
    pub bootstrap_peers: Vec<String>,

    /// When `true` the binary embedding this node should suppress log output.
    /// The library itself never installs a tracing subscriber.
    pub quiet: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            difficulty: Difficulty::default(),
            mining: MiningPolicy::default(),
            resolver: ResolverConfig::default(),
            resolve_interval: None,
            preempt_mining_on_resolve: false,
            bootstrap_peers: Vec::new(),
            quiet: false,
        }
    }
}

impl NodeConfig {
    /// Default config on a specific port.
    pub fn on_port(port: u16) -> Self {
        Self {
            port,
            ..Self::default()
        }
    }

    /// Address the HTTP API binds to (all interfaces).
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_difficulty() {
        let config = NodeConfig::default();
        assert_eq!(config.difficulty.prefix(), "11");
        assert!(config.mining.max_attempts.is_some());
        assert!(config.resolve_interval.is_none());
    }

    #[test]
    fn on_port_sets_listen_addr() {
        assert_eq!(NodeConfig::on_port(3000).listen_addr().port(), 3000);
    }
}
