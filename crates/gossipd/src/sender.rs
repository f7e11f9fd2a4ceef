//! Full-state anti-entropy dissemination

use lww_gossip_core::wire::GossipPayload;
use lww_gossip_core::LwwStore;
use lww_gossip_net::PeerClient;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Delivery bookkeeping for one peer
#[derive(Debug, Clone, Default)]
pub struct PeerSyncState {
    /// Last successful push
    pub last_success: Option<Instant>,
    /// Number of snapshots delivered
    pub delivered: u64,
    /// Consecutive failures
    pub failures: u32,
    /// Most recent failure, cleared on success
    pub last_error: Option<String>,
}

/// Result of one gossip cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Entries in the snapshot that was sent
    pub entries: usize,
    pub delivered: usize,
    pub failed: usize,
    /// Shutdown was observed before every peer was tried
    pub cancelled: bool,
}

/// Periodically pushes the whole store to every peer.
///
/// Each cycle sends a fresh snapshot, never a delta, so a missed round is
/// repaired by the next one. Peers are tried one after another; a failure
/// is logged and the cycle moves on.
pub struct GossipSender {
    store: Arc<LwwStore>,
    client: PeerClient,
    peers: Vec<String>,
    interval: Duration,
    /// Per-peer delivery state
    state: RwLock<HashMap<String, PeerSyncState>>,
    rounds: AtomicU64,
}

impl GossipSender {
    pub fn new(
        store: Arc<LwwStore>,
        peers: Vec<String>,
        interval: Duration,
        send_timeout: Duration,
    ) -> Self {
        let state = peers
            .iter()
            .map(|p| (p.clone(), PeerSyncState::default()))
            .collect();

        Self {
            store,
            client: PeerClient::new(send_timeout),
            peers,
            interval,
            state: RwLock::new(state),
            rounds: AtomicU64::new(0),
        }
    }

    pub fn peers(&self) -> &[String] {
        &self.peers
    }

    /// Gossip until `shutdown` fires.
    ///
    /// The first cycle runs immediately.
    pub async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "Gossip sender started: {} peers every {:?}",
            self.peers.len(),
            self.interval
        );

        loop {
            let stopping = tokio::select! {
                _ = ticker.tick() => false,
                _ = shutdown.recv() => true,
            };
            if stopping || self.run_cycle(&mut shutdown).await.cancelled {
                break;
            }
        }

        info!("Gossip sender stopped");
    }

    /// Snapshot the store and push it to every peer once.
    ///
    /// Shutdown is checked between peers; an in-flight push is bounded by
    /// the send timeout.
    pub async fn run_cycle(&self, shutdown: &mut broadcast::Receiver<()>) -> CycleReport {
        let payload = GossipPayload::from_snapshot(self.store.snapshot());
        let mut report = CycleReport {
            entries: payload.len(),
            ..CycleReport::default()
        };

        for peer in &self.peers {
            if !matches!(shutdown.try_recv(), Err(TryRecvError::Empty)) {
                debug!("Gossip cycle cancelled before {}", peer);
                report.cancelled = true;
                return report;
            }

            match self.client.push(peer, &payload).await {
                Ok(()) => {
                    report.delivered += 1;
                    self.mark_success(peer);
                }
                Err(e) => {
                    warn!("Gossip to {} failed: {}", peer, e);
                    report.failed += 1;
                    self.mark_failure(peer, e.to_string());
                }
            }
        }

        self.rounds.fetch_add(1, Ordering::Relaxed);
        debug!(
            "Gossip cycle sent {} entries: {} delivered, {} failed",
            report.entries, report.delivered, report.failed
        );
        report
    }

    fn mark_success(&self, peer: &str) {
        let mut state = self.state.write();
        let entry = state.entry(peer.to_string()).or_default();
        entry.last_success = Some(Instant::now());
        entry.delivered += 1;
        entry.failures = 0;
        entry.last_error = None;
    }

    fn mark_failure(&self, peer: &str, error: String) {
        let mut state = self.state.write();
        let entry = state.entry(peer.to_string()).or_default();
        entry.failures += 1;
        entry.last_error = Some(error);
    }

    /// Delivery state for one peer
    pub fn peer_state(&self, peer: &str) -> Option<PeerSyncState> {
        self.state.read().get(peer).cloned()
    }

    /// Get sender statistics
    pub fn stats(&self) -> SenderStats {
        let state = self.state.read();
        SenderStats {
            peer_count: self.peers.len(),
            rounds: self.rounds.load(Ordering::Relaxed),
            delivered: state.values().map(|s| s.delivered).sum(),
            failing_peers: state.values().filter(|s| s.failures > 0).count(),
        }
    }
}

/// Sender statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderStats {
    pub peer_count: usize,
    /// Completed cycles
    pub rounds: u64,
    /// Snapshots delivered across all peers
    pub delivered: u64,
    /// Peers whose last push failed
    pub failing_peers: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use lww_gossip_core::GossipReceiver;
    use tokio::net::TcpListener;

    async fn spawn_peer(store: Arc<LwwStore>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let app = lww_gossip_net::router(GossipReceiver::new(store));
        tokio::spawn(lww_gossip_net::serve(listener, app, std::future::pending()));
        addr
    }

    async fn dead_peer() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_failing_peer_does_not_block_others() {
        let remote = Arc::new(LwwStore::new());
        let live = spawn_peer(remote.clone()).await;
        let dead = dead_peer().await;

        let local = Arc::new(LwwStore::new());
        local.put("disp0:temperature", 100, 1, 21.0);
        local.put("disp0:vibration", 100, 1, 0.4);

        let sender = GossipSender::new(
            local,
            vec![dead.clone(), live.clone()],
            Duration::from_secs(2),
            Duration::from_millis(500),
        );
        let (_tx, mut rx) = broadcast::channel(1);

        let report = sender.run_cycle(&mut rx).await;
        assert_eq!(
            report,
            CycleReport {
                entries: 2,
                delivered: 1,
                failed: 1,
                cancelled: false,
            }
        );
        assert_eq!(remote.len(), 2);

        let dead_state = sender.peer_state(&dead).unwrap();
        assert_eq!(dead_state.failures, 1);
        assert!(dead_state.last_error.is_some());
        assert_eq!(sender.peer_state(&live).unwrap().delivered, 1);

        let stats = sender.stats();
        assert_eq!(stats.rounds, 1);
        assert_eq!(stats.failing_peers, 1);
    }

    #[tokio::test]
    async fn test_cycle_observes_shutdown() {
        let remote = Arc::new(LwwStore::new());
        let live = spawn_peer(remote.clone()).await;

        let local = Arc::new(LwwStore::new());
        local.put("k", 1, 1, 1.0);
        let sender = GossipSender::new(local, vec![live], Duration::from_secs(2), Duration::from_secs(1));

        let (tx, mut rx) = broadcast::channel(1);
        tx.send(()).unwrap();

        let report = sender.run_cycle(&mut rx).await;
        assert!(report.cancelled);
        assert_eq!(report.delivered, 0);
        assert!(remote.is_empty());
    }

    #[tokio::test]
    async fn test_run_exits_on_shutdown() {
        let remote = Arc::new(LwwStore::new());
        let live = spawn_peer(remote.clone()).await;

        let local = Arc::new(LwwStore::new());
        local.put("k", 1, 1, 1.0);
        let sender = Arc::new(GossipSender::new(
            local,
            vec![live],
            Duration::from_millis(20),
            Duration::from_secs(1),
        ));

        let (tx, rx) = broadcast::channel(1);
        let handle = tokio::spawn(sender.clone().run(rx));

        tokio::time::timeout(Duration::from_secs(5), async {
            while remote.is_empty() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(sender.stats().rounds >= 1);
    }
}
