//! Last-writer-wins map with whole-operation locking

use crate::types::{Entry, NodeId};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Authoritative local CRDT state.
///
/// One lock guards the whole map. `put` and `merge_all` hold the write lock
/// for their entire operation (the whole batch for `merge_all`); `snapshot`
/// holds the read lock while cloning. None of them await, so the lock is
/// never held across a suspension point.
#[derive(Debug, Default)]
pub struct LwwStore {
    entries: RwLock<HashMap<String, Entry>>,
}

impl LwwStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert one fact. Returns `true` if it became the stored entry.
    ///
    /// Stale writes are discarded silently.
    pub fn put(&self, key: impl Into<String>, timestamp: i64, node_id: NodeId, value: f64) -> bool {
        let entry = Entry::new(key, timestamp, node_id, value);
        let mut entries = self.entries.write();
        apply(&mut entries, entry)
    }

    /// Merge a batch of entries, returning how many changed the state.
    pub fn merge_all<I>(&self, batch: I) -> usize
    where
        I: IntoIterator<Item = Entry>,
    {
        let mut entries = self.entries.write();
        batch
            .into_iter()
            .map(|entry| apply(&mut entries, entry))
            .filter(|applied| *applied)
            .count()
    }

    /// Independent copy of the current mapping
    pub fn snapshot(&self) -> HashMap<String, Entry> {
        self.entries.read().clone()
    }

    /// Current entry for a key
    pub fn get(&self, key: &str) -> Option<Entry> {
        self.entries.read().get(key).cloned()
    }

    /// Number of keys held
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

/// The merge rule: insert unseen keys, replace only on strict dominance.
///
/// Non-finite values cannot be gossiped as JSON numbers and are dropped.
fn apply(entries: &mut HashMap<String, Entry>, entry: Entry) -> bool {
    if !entry.value.is_finite() {
        return false;
    }
    match entries.get_mut(&entry.key) {
        None => {
            entries.insert(entry.key.clone(), entry);
            true
        }
        Some(current) if entry.dominates(current) => {
            *current = entry;
            true
        }
        Some(_) => false,
    }
}
