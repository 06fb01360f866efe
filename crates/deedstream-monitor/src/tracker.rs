//! Operation tracker — records platform operations durably and keeps a
//! bounded in-memory ring of recent ones for dashboards.
//!
//! The ring is purely a hot cache; the persisted store is the source of
//! truth and every aggregate is recomputed from it.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use deedstream_core::error::StoreError;
use deedstream_core::ops::OperationRecord;
use deedstream_core::store::IndexStore;

/// Records tracked operations and serves the recent-operations cache.
pub struct EventTracker {
    store: Arc<dyn IndexStore>,
    recent: Mutex<VecDeque<OperationRecord>>,
    capacity: usize,
}

impl EventTracker {
    pub fn new(store: Arc<dyn IndexStore>, capacity: usize) -> Self {
        Self {
            store,
            recent: Mutex::new(VecDeque::with_capacity(capacity.min(1_024))),
            capacity: capacity.max(1),
        }
    }

    /// Persist an operation (upsert by id) and refresh the ring.
    pub async fn track(&self, op: &OperationRecord) -> Result<(), StoreError> {
        self.store.upsert_operation(op).await?;

        let mut recent = self.recent.lock().unwrap();
        // A status update replaces the cached entry rather than duplicating it.
        if let Some(existing) = recent.iter_mut().find(|r| r.id == op.id) {
            *existing = op.clone();
            return Ok(());
        }
        if recent.len() >= self.capacity {
            recent.pop_front();
        }
        recent.push_back(op.clone());
        Ok(())
    }

    /// Most recent operations, newest first.
    pub fn recent(&self, limit: usize) -> Vec<OperationRecord> {
        let recent = self.recent.lock().unwrap();
        recent.iter().rev().take(limit).cloned().collect()
    }

    pub fn cached_len(&self) -> usize {
        self.recent.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deedstream_core::ops::{OperationKind, OperationStatus};
    use deedstream_core::store::OperationQuery;
    use deedstream_storage::MemoryStore;

    fn op(id: &str) -> OperationRecord {
        OperationRecord {
            id: id.into(),
            kind: OperationKind::Transfer,
            status: OperationStatus::Pending,
            network: "sepolia".into(),
            from: Some("0x1".into()),
            to: Some("0x2".into()),
            user: None,
            gas_used: None,
            started_at: 1_700_000_000,
            confirmed_at: None,
        }
    }

    #[tokio::test]
    async fn ring_is_bounded() {
        let store = Arc::new(MemoryStore::new());
        let tracker = EventTracker::new(store.clone(), 3);
        for i in 0..5 {
            tracker.track(&op(&format!("0x{i}"))).await.unwrap();
        }
        assert_eq!(tracker.cached_len(), 3);
        let recent = tracker.recent(10);
        assert_eq!(recent[0].id, "0x4"); // newest first
        assert_eq!(recent[2].id, "0x2");

        // The store kept everything — it is the source of truth.
        let all = store.operations(&OperationQuery::default()).await.unwrap();
        assert_eq!(all.len(), 5);
    }

    #[tokio::test]
    async fn status_update_replaces_cached_entry() {
        let store = Arc::new(MemoryStore::new());
        let tracker = EventTracker::new(store, 10);
        let mut record = op("0xabc");
        tracker.track(&record).await.unwrap();

        record.status = OperationStatus::Confirmed;
        record.confirmed_at = Some(1_700_000_030);
        tracker.track(&record).await.unwrap();

        assert_eq!(tracker.cached_len(), 1);
        assert_eq!(tracker.recent(1)[0].status, OperationStatus::Confirmed);
    }
}
