//! Merge-on-receive for inbound gossip batches

use crate::error::RejectedItem;
use crate::store::LwwStore;
use crate::wire::{normalize_item, GossipPayload};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Outcome of one received batch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReceiveReport {
    /// Items that normalized cleanly and were handed to the store
    pub accepted: usize,
    /// Accepted items that actually changed the store
    pub applied: usize,
    /// Items skipped, with their index in the batch
    pub rejected: Vec<RejectedItem>,
}

impl ReceiveReport {
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }
}

/// Validates inbound batches and merges them into the shared store.
///
/// Malformed items are skipped and reported; the rest of the batch is
/// still merged, in a single `merge_all` call.
#[derive(Debug, Clone)]
pub struct GossipReceiver {
    store: Arc<LwwStore>,
}

impl GossipReceiver {
    pub fn new(store: Arc<LwwStore>) -> Self {
        Self { store }
    }

    /// The store this receiver merges into
    pub fn store(&self) -> &Arc<LwwStore> {
        &self.store
    }

    /// Handle a decoded `POST /gossip` body
    pub fn receive(&self, payload: GossipPayload) -> ReceiveReport {
        self.receive_items(&payload.lww)
    }

    /// Normalize each item, skip the bad ones, merge the rest
    pub fn receive_items(&self, items: &[Value]) -> ReceiveReport {
        let mut entries = Vec::with_capacity(items.len());
        let mut rejected = Vec::new();

        for (index, item) in items.iter().enumerate() {
            match normalize_item(item) {
                Ok(entry) => entries.push(entry),
                Err(error) => {
                    warn!("Skipping gossip item {}: {}", index, error);
                    rejected.push(RejectedItem { index, error });
                }
            }
        }

        let accepted = entries.len();
        let applied = self.store.merge_all(entries);
        debug!(
            "Merged gossip batch: {} accepted, {} applied, {} rejected",
            accepted,
            applied,
            rejected.len()
        );

        ReceiveReport {
            accepted,
            applied,
            rejected,
        }
    }
}
