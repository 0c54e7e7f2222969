use std::{sync::Arc, time::Duration};

use clap::{Parser, ValueEnum};
use hc_blockchain::{Difficulty, MiningPolicy, HASH_SCHEME};
use hc_node::{api, Node, NodeConfig};
use hc_sync::{ConsensusRule, ResolverConfig};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// hashchain ledger node daemon.
#[derive(Parser, Debug)]
#[command(
    name = "hc-node",
    version,
    about = "hashchain proof-of-work ledger node",
    long_about = "Runs a hashchain node that accepts transactions, mines blocks \
                  by proof-of-work, and adopts the longest chain among its peers."
)]
struct Cli {
    /// TCP port the HTTP API listens on.
    #[arg(short, long, default_value_t = 8080, env = "HC_PORT")]
    port: u16,

    /// Hex prefix every block hash must start with.
    #[arg(short, long, default_value = "11", env = "HC_DIFFICULTY")]
    difficulty: Difficulty,

    /// Maximum nonces tried per block. 0 removes the cap.
    #[arg(long, default_value_t = 10_000_000, env = "HC_MAX_ATTEMPTS")]
    max_attempts: u64,

    /// Seconds a single proof-of-work search may run. 0 removes the deadline.
    #[arg(long, default_value_t = 60, env = "HC_MINING_DEADLINE")]
    mining_deadline: u64,

    /// Milliseconds to wait for any single peer during resolution.
    #[arg(long, default_value_t = 5_000, env = "HC_PEER_TIMEOUT_MS")]
    peer_timeout_ms: u64,

    /// Milliseconds a whole resolution round may take.
    #[arg(long, default_value_t = 15_000, env = "HC_RESOLVE_DEADLINE_MS")]
    resolve_deadline_ms: u64,

    /// Which peer chains may replace the local one.
    #[arg(short, long, default_value = "longest-valid", env = "HC_CONSENSUS")]
    consensus: CliConsensus,

    /// Run resolution every N seconds. 0 (default) resolves only on request.
    #[arg(long, default_value_t = 0, env = "HC_RESOLVE_INTERVAL")]
    resolve_interval: u64,

    /// Cancel an in-flight mining search when a resolution round applies.
    #[arg(long, default_value_t = false, env = "HC_PREEMPT_MINING")]
    preempt_mining: bool,

    /// Peer address (host:port) to register at startup. Repeatable.
    #[arg(long = "peer", env = "HC_PEERS", value_delimiter = ',')]
    peers: Vec<String>,

    /// Suppress log output to stderr (run silently).
    #[arg(short, long, default_value_t = false, env = "HC_QUIET")]
    quiet: bool,
}

#[derive(ValueEnum, Debug, Clone)]
enum CliConsensus {
    /// Validate linkage and proof-of-work before comparing lengths.
    #[value(name = "longest-valid")]
    LongestValid,
    /// Compare lengths only, trusting peers.
    #[value(name = "longest-trusted")]
    LongestTrusted,
}

fn nonzero<T>(value: u64, f: impl FnOnce(u64) -> T) -> Option<T> {
    (value > 0).then(|| f(value))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_filter = if cli.quiet {
        EnvFilter::new("off")
    } else {
        EnvFilter::from_default_env()
            .add_directive("hc_node=info".parse()?)
            .add_directive("hc_sync=info".parse()?)
    };
    tracing_subscriber::fmt().with_env_filter(log_filter).init();

    let config = NodeConfig {
        port: cli.port,
        difficulty: cli.difficulty,
        mining: MiningPolicy {
            max_attempts: nonzero(cli.max_attempts, |n| n),
            deadline: nonzero(cli.mining_deadline, Duration::from_secs),
        },
        resolver: ResolverConfig {
            peer_timeout: Duration::from_millis(cli.peer_timeout_ms),
            overall_deadline: Duration::from_millis(cli.resolve_deadline_ms),
            rule: match cli.consensus {
                CliConsensus::LongestValid => ConsensusRule::LongestValid,
                CliConsensus::LongestTrusted => ConsensusRule::LongestTrusted,
            },
        },
        resolve_interval: nonzero(cli.resolve_interval, Duration::from_secs),
        preempt_mining_on_resolve: cli.preempt_mining,
        bootstrap_peers: cli.peers,
        quiet: cli.quiet,
    };

    info!(
        port = config.port,
        difficulty = %config.difficulty,
        hash_scheme = HASH_SCHEME,
        consensus = ?config.resolver.rule,
        peers = config.bootstrap_peers.len(),
        "Starting hashchain node"
    );

    let (node, mut events) = Node::new(config.clone())?;
    let node = Arc::new(node);

    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            info!("NodeEvent: {event:?}");
        }
    });

    if let Some(interval) = config.resolve_interval {
        let node = Arc::clone(&node);
        tokio::spawn(async move { node.run_periodic_resolution(interval).await });
    }

    let shutdown_node = Arc::clone(&node);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutting down");
            shutdown_node.shutdown();
        }
    });

    let listener = TcpListener::bind(config.listen_addr()).await?;
    api::serve(node, listener).await?;

    Ok(())
}
