use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use crate::Collection;

pub type WriteId = u64;

/// The lifecycle of a single in-flight mutation.
///
/// Every write starts out applied to local state before the store
/// acknowledges it, so each one is tracked explicitly instead of being
/// fired and forgotten.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStatus {
    Pending,
    Committed,
    Failed,
}

#[derive(Debug, Clone)]
pub struct WriteRecord {
    pub id: WriteId,
    pub collection: Collection,
    pub entity_id: String,
    pub status: WriteStatus,
}

/// Tracks optimistic writes from begin to settlement
pub struct WriteTracker {
    counter: AtomicU64,
    records: DashMap<WriteId, WriteRecord>,
}

impl WriteTracker {
    pub fn new() -> Self {
        Self {
            counter: AtomicU64::new(1),
            records: Default::default(),
        }
    }

    /// Registers a new pending write and returns its id
    pub fn begin(&self, collection: Collection, entity_id: &str) -> WriteId {
        let id = self.counter.fetch_add(1, Ordering::SeqCst);

        self.records.insert(
            id,
            WriteRecord {
                id,
                collection,
                entity_id: entity_id.to_string(),
                status: WriteStatus::Pending,
            },
        );

        id
    }

    pub fn commit(&self, id: WriteId) {
        if let Some(mut record) = self.records.get_mut(&id) {
            record.status = WriteStatus::Committed;
        }
    }

    pub fn fail(&self, id: WriteId) {
        if let Some(mut record) = self.records.get_mut(&id) {
            record.status = WriteStatus::Failed;
        }
    }

    pub fn status(&self, id: WriteId) -> Option<WriteStatus> {
        self.records.get(&id).map(|r| r.status)
    }

    /// True if any write for the given entity is still awaiting the store
    pub fn has_pending(&self, entity_id: &str) -> bool {
        self.records
            .iter()
            .any(|r| r.entity_id == entity_id && r.status == WriteStatus::Pending)
    }

    /// Drops settled records, keeping the map bounded by in-flight writes
    pub fn clear_settled(&self) {
        self.records.retain(|_, r| r.status == WriteStatus::Pending);
    }
}

impl Default for WriteTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_write_lifecycle() {
        let tracker = WriteTracker::new();

        let id = tracker.begin(Collection::Rehearsals, "r1");
        assert_eq!(tracker.status(id), Some(WriteStatus::Pending));
        assert!(tracker.has_pending("r1"));

        tracker.commit(id);
        assert_eq!(tracker.status(id), Some(WriteStatus::Committed));
        assert!(!tracker.has_pending("r1"));

        tracker.clear_settled();
        assert_eq!(tracker.status(id), None);
    }

    #[test]
    fn test_failed_write_is_observable() {
        let tracker = WriteTracker::new();

        let id = tracker.begin(Collection::Songs, "s1");
        tracker.fail(id);

        assert_eq!(tracker.status(id), Some(WriteStatus::Failed));
    }
}
