//! Replicated value types
//!
//! An [`Entry`] is one replicated fact. Entries for the same key are ordered
//! by their [`Version`]; the greater version wins.

use std::cmp::Ordering;
use std::time::{SystemTime, UNIX_EPOCH};

/// Node identity, used as the timestamp tiebreak
pub type NodeId = u64;

/// Dominance key of an entry.
///
/// Field order matters: the derived `Ord` compares `timestamp` first and
/// falls back to `node_id`, which makes it a total order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    /// Wall-clock milliseconds at the writer
    pub timestamp: i64,
    /// Writer's node id
    pub node_id: NodeId,
}

impl Version {
    pub fn new(timestamp: i64, node_id: NodeId) -> Self {
        Self { timestamp, node_id }
    }
}

/// One replicated fact
#[derive(Clone, Debug, PartialEq)]
pub struct Entry {
    pub key: String,
    pub timestamp: i64,
    pub node_id: NodeId,
    pub value: f64,
}

impl Entry {
    pub fn new(key: impl Into<String>, timestamp: i64, node_id: NodeId, value: f64) -> Self {
        Self {
            key: key.into(),
            timestamp,
            node_id,
            value,
        }
    }

    /// The `(timestamp, node_id)` pair this entry is ordered by
    pub fn version(&self) -> Version {
        Version::new(self.timestamp, self.node_id)
    }

    /// True if this entry strictly wins over `other`.
    ///
    /// Identical entries do not dominate, so re-applying an entry is a no-op.
    /// Equal versions with different values only happen if a writer reuses a
    /// stamp; the greater value wins so the outcome is order-independent.
    pub fn dominates(&self, other: &Entry) -> bool {
        match self.version().cmp(&other.version()) {
            Ordering::Greater => true,
            Ordering::Less => false,
            Ordering::Equal => self.value.total_cmp(&other.value) == Ordering::Greater,
        }
    }
}

/// Current wall-clock time in unix milliseconds
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_orders_first() {
        let older = Version::new(9, 9);
        let newer = Version::new(10, 1);
        assert!(newer > older);
    }

    #[test]
    fn test_node_id_breaks_ties() {
        let a = Entry::new("k", 5, 1, 10.0);
        let b = Entry::new("k", 5, 2, 20.0);
        assert!(b.dominates(&a));
        assert!(!a.dominates(&b));
    }

    #[test]
    fn test_identical_entries_do_not_dominate() {
        let a = Entry::new("k", 5, 1, 10.0);
        assert!(!a.dominates(&a.clone()));
    }

    #[test]
    fn test_reused_stamp_orders_by_value() {
        let low = Entry::new("k", 5, 1, 10.0);
        let high = Entry::new("k", 5, 1, 20.0);
        assert!(high.dominates(&low));
        assert!(!low.dominates(&high));
    }

    #[test]
    fn test_now_millis_is_after_epoch() {
        assert!(now_millis() > 1_600_000_000_000);
    }
}
