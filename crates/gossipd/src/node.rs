//! Node composition: one store shared by the sender and the receiver

use crate::sender::GossipSender;
use lww_gossip_core::{now_millis, GossipReceiver, LwwStore, NodeId};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Settings the node is constructed with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    /// Tiebreak id stamped on local writes
    pub node_id: NodeId,
    /// Static peer list
    pub peers: Vec<String>,
    pub gossip_interval: Duration,
    pub send_timeout: Duration,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_id: 0,
            peers: Vec::new(),
            gossip_interval: Duration::from_secs(2),
            send_timeout: Duration::from_secs(3),
        }
    }
}

/// A gossip peer.
///
/// Local writes, inbound merges and the sender loop all go through the one
/// [`LwwStore`] held here.
pub struct Node {
    node_id: NodeId,
    store: Arc<LwwStore>,
    sender: Arc<GossipSender>,
    /// Last timestamp stamped on a local write
    last_stamp: AtomicI64,
    /// Shutdown signal for the sender loop
    shutdown_tx: broadcast::Sender<()>,
    sender_task: Mutex<Option<JoinHandle<()>>>,
}

impl Node {
    pub fn new(config: NodeConfig) -> Self {
        let store = Arc::new(LwwStore::new());
        let sender = Arc::new(GossipSender::new(
            store.clone(),
            config.peers,
            config.gossip_interval,
            config.send_timeout,
        ));
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            node_id: config.node_id,
            store,
            sender,
            last_stamp: AtomicI64::new(i64::MIN),
            shutdown_tx,
            sender_task: Mutex::new(None),
        }
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn store(&self) -> &Arc<LwwStore> {
        &self.store
    }

    pub fn sender(&self) -> &Arc<GossipSender> {
        &self.sender
    }

    /// Receiver merging into this node's store
    pub fn receiver(&self) -> GossipReceiver {
        GossipReceiver::new(self.store.clone())
    }

    /// Record a local value stamped with the next local timestamp and our
    /// node id. Returns whether the store took it.
    pub fn write(&self, key: impl Into<String>, value: f64) -> bool {
        self.store.put(key, self.next_stamp(), self.node_id, value)
    }

    /// Wall-clock milliseconds, bumped so local stamps strictly increase
    pub fn next_stamp(&self) -> i64 {
        let now = now_millis();
        let previous = self
            .last_stamp
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| {
                Some(now.max(last.saturating_add(1)))
            })
            .unwrap_or(now);
        now.max(previous.saturating_add(1))
    }

    /// Launch the sender loop. Must be called within a tokio runtime.
    pub fn start(&self) {
        let mut task = self.sender_task.lock();
        if task.is_some() {
            return;
        }

        info!(
            "Node {} starting with {} peers",
            self.node_id,
            self.sender.peers().len()
        );
        let shutdown_rx = self.shutdown_tx.subscribe();
        *task = Some(tokio::spawn(self.sender.clone().run(shutdown_rx)));
    }

    pub fn is_running(&self) -> bool {
        self.sender_task.lock().is_some()
    }

    /// Cancel the sender loop and wait for it to exit
    pub async fn shutdown(&self) {
        let task = self.sender_task.lock().take();
        let Some(task) = task else {
            return;
        };

        let _ = self.shutdown_tx.send(());
        if let Err(e) = task.await {
            debug!("Sender task ended abnormally: {}", e);
        }
        info!("Node {} stopped", self.node_id);
    }
}
