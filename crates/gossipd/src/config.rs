//! Configuration for gossipd

use crate::generator::GeneratorConfig;
use crate::node::NodeConfig;
use clap::{Parser, ValueEnum};
use lww_gossip_core::NodeId;
use std::net::SocketAddr;
use std::time::Duration;

/// Log output format
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// gossipd - LWW map gossip node
#[derive(Parser, Debug, Clone)]
#[command(name = "gossipd")]
#[command(about = "LWW map gossip node")]
pub struct Config {
    /// Listen address for the gossip HTTP endpoint
    #[arg(short, long, env = "GOSSIP_LISTEN", default_value = "0.0.0.0:7000")]
    pub listen: SocketAddr,

    /// Node id used to break timestamp ties (defaults to the listen port)
    #[arg(long, env = "GOSSIP_NODE_ID")]
    pub node_id: Option<NodeId>,

    /// Peers to gossip with (comma-separated host:port or URLs)
    #[arg(long, env = "GOSSIP_PEERS", value_delimiter = ',')]
    pub peers: Vec<String>,

    /// Gossip interval in milliseconds
    #[arg(long, default_value = "2000")]
    pub gossip_interval_ms: u64,

    /// Per-peer send timeout in milliseconds
    #[arg(long, default_value = "3000")]
    pub send_timeout_ms: u64,

    /// Write synthetic device metrics into the local store
    #[arg(long)]
    pub generate: bool,

    /// Metric generation interval in milliseconds
    #[arg(long, default_value = "500")]
    pub generate_interval_ms: u64,

    /// Number of simulated devices
    #[arg(long, default_value = "10")]
    pub devices: usize,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Log format
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}

impl Config {
    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.gossip_interval_ms == 0 {
            anyhow::bail!("Gossip interval must be positive");
        }
        if self.send_timeout_ms == 0 {
            anyhow::bail!("Send timeout must be positive");
        }
        if self.generate && self.generate_interval_ms == 0 {
            anyhow::bail!("Generation interval must be positive");
        }
        for peer in self.peer_addrs() {
            if peer.parse::<SocketAddr>().ok() == Some(self.listen) {
                anyhow::bail!("Peer list contains our own address {}", peer);
            }
        }
        Ok(())
    }

    /// Effective node id
    pub fn node_id(&self) -> NodeId {
        self.node_id.unwrap_or(self.listen.port() as NodeId)
    }

    /// Peers with whitespace and empty items removed
    pub fn peer_addrs(&self) -> Vec<String> {
        self.peers
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn node_config(&self) -> NodeConfig {
        NodeConfig {
            node_id: self.node_id(),
            peers: self.peer_addrs(),
            gossip_interval: Duration::from_millis(self.gossip_interval_ms),
            send_timeout: Duration::from_millis(self.send_timeout_ms),
        }
    }

    /// Generator settings, if generation is enabled
    pub fn generator_config(&self) -> Option<GeneratorConfig> {
        self.generate.then(|| GeneratorConfig {
            interval: Duration::from_millis(self.generate_interval_ms),
            devices: self.devices,
        })
    }
}
