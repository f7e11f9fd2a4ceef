//! Store summaries grouped by device, for convergence logs

use lww_gossip_core::{Entry, NodeId};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

/// Metric name used for keys without a `device:` prefix
const DEFAULT_METRIC: &str = "value";

#[derive(Debug, Clone, PartialEq)]
pub struct MetricReading {
    pub metric: String,
    pub value: f64,
    pub timestamp: i64,
    pub node_id: NodeId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeviceSummary {
    pub device: String,
    /// Sorted by metric name
    pub readings: Vec<MetricReading>,
}

impl DeviceSummary {
    /// `metric=value@ts nid=node, ...`
    pub fn render(&self) -> String {
        self.readings
            .iter()
            .map(|r| format!("{}={:.2}@{} nid={}", r.metric, r.value, r.timestamp, r.node_id))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Split keys on the first `:` and group readings per device.
///
/// Devices named `disp<N>` come first in numeric order, the rest follow
/// lexically.
pub fn group_by_device(snapshot: &HashMap<String, Entry>) -> Vec<DeviceSummary> {
    let mut grouped: BTreeMap<(u8, u64, String), Vec<MetricReading>> = BTreeMap::new();

    for entry in snapshot.values() {
        let (device, metric) = entry
            .key
            .split_once(':')
            .unwrap_or((entry.key.as_str(), DEFAULT_METRIC));

        grouped.entry(device_order(device)).or_default().push(MetricReading {
            metric: metric.to_string(),
            value: entry.value,
            timestamp: entry.timestamp,
            node_id: entry.node_id,
        });
    }

    grouped
        .into_iter()
        .map(|((_, _, device), mut readings)| {
            readings.sort_by(|a, b| a.metric.cmp(&b.metric));
            DeviceSummary { device, readings }
        })
        .collect()
}

fn device_order(device: &str) -> (u8, u64, String) {
    match device.strip_prefix("disp").and_then(|n| n.parse::<u64>().ok()) {
        Some(n) => (0, n, device.to_string()),
        None => (1, u64::MAX, device.to_string()),
    }
}

/// Log a header at info and one line per device at debug
pub fn log_state(snapshot: &HashMap<String, Entry>, title: &str) {
    let devices = group_by_device(snapshot);
    info!("State {}: {} devices, {} keys", title, devices.len(), snapshot.len());
    for device in &devices {
        debug!("State {}: {}", device.device, device.render());
    }
}
