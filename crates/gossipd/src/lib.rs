//! gossipd - LWW map gossip node
//!
//! This daemon provides:
//! - A last-writer-wins map replicated by full-state anti-entropy gossip
//! - The `POST /gossip` and `GET /health` endpoint
//! - Optional synthetic device metrics as a local write workload
//! - Per-device state summaries for following convergence in the logs

pub mod config;
pub mod generator;
pub mod node;
pub mod sender;
pub mod server;
pub mod summary;

pub use config::Config;
pub use generator::MetricGenerator;
pub use node::{Node, NodeConfig};
pub use sender::GossipSender;
pub use server::Server;
