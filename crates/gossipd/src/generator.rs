//! Synthetic device metrics written into the local store

use crate::node::Node;
use crate::summary;
use rand::Rng;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{debug, info};

/// Metrics reported by every simulated device
pub const METRICS: [&str; 2] = ["temperature", "vibration"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorConfig {
    pub interval: Duration,
    pub devices: usize,
}

/// Writes `disp{i}:{metric}` readings through [`Node::write`]
pub struct MetricGenerator {
    node: Arc<Node>,
    config: GeneratorConfig,
}

impl MetricGenerator {
    pub fn new(node: Arc<Node>, config: GeneratorConfig) -> Self {
        Self { node, config }
    }

    /// One reading per device and metric, values uniform in `[0, 100)`.
    /// Returns how many writes were applied.
    pub fn generate_round<R: Rng>(&self, rng: &mut R) -> usize {
        let mut applied = 0;
        for device in 0..self.config.devices {
            for metric in METRICS {
                let key = format!("disp{}:{}", device, metric);
                let value: f64 = rng.gen_range(0.0..100.0);
                if self.node.write(key.as_str(), value) {
                    applied += 1;
                }
                debug!("Local write {} = {:.2} nid={}", key, value, self.node.node_id());
            }
        }
        applied
    }

    /// Generate rounds until `shutdown` resolves
    pub async fn run<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut ticker = interval(self.config.interval);
        info!(
            "Metric generator started: {} devices every {:?}",
            self.config.devices, self.config.interval
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    // ThreadRng is not Send; keep it out of the await
                    let applied = self.generate_round(&mut rand::thread_rng());
                    debug!("Generated {} local readings", applied);
                    summary::log_state(&self.node.store().snapshot(), "after local generation");
                }
                _ = &mut shutdown => {
                    break;
                }
            }
        }

        info!("Metric generator stopped");
    }
}
