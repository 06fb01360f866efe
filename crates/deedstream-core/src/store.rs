//! The storage abstraction — everything the ingestor, reorg detector, and
//! monitor need from a backend.
//!
//! Backends implement [`IndexStore`]; `deedstream-storage` ships the
//! in-memory and SQLite implementations. Every method is scoped so that one
//! network's writes never contend with another's; the per-network checkpoint
//! row is the only coordination point and has exactly one logical writer.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::checkpoint::{CheckpointPatch, IndexerCheckpoint};
use crate::error::StoreError;
use crate::events::{
    ClaimEvent, ComplianceEvent, ComplianceViolation, DomainEvent, IdentityEvent, TransferEvent,
};
use crate::ops::{OperationKind, OperationRecord, OperationStatus};
use crate::reorg::ReorgRecord;
use crate::types::LogEvent;

// ─── Query types ─────────────────────────────────────────────────────────────

/// Paginated filter over raw events and domain-event projections.
/// Limit/offset semantics; unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct EventQuery {
    pub network: Option<String>,
    /// Emitting contract (raw events) / token or module address (projections).
    pub address: Option<String>,
    pub from_block: Option<u64>,
    pub to_block: Option<u64>,
    pub from_timestamp: Option<i64>,
    pub to_timestamp: Option<i64>,
    /// Raw events only: include rows retracted by a reorg.
    pub include_removed: bool,
    pub limit: Option<u64>,
    pub offset: u64,
}

impl EventQuery {
    pub fn network(network: impl Into<String>) -> Self {
        Self {
            network: Some(network.into()),
            ..Default::default()
        }
    }

    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn block_range(mut self, from: u64, to: u64) -> Self {
        self.from_block = Some(from);
        self.to_block = Some(to);
        self
    }

    pub fn include_removed(mut self) -> Self {
        self.include_removed = true;
        self
    }

    pub fn page(mut self, limit: u64, offset: u64) -> Self {
        self.limit = Some(limit);
        self.offset = offset;
        self
    }

    /// Returns `true` if a raw event row passes this filter.
    pub fn matches_event(&self, event: &LogEvent) -> bool {
        if let Some(network) = &self.network {
            if &event.network != network {
                return false;
            }
        }
        if let Some(address) = &self.address {
            if !event.address.eq_ignore_ascii_case(address) {
                return false;
            }
        }
        if let Some(from) = self.from_block {
            if event.block_number < from {
                return false;
            }
        }
        if let Some(to) = self.to_block {
            if event.block_number > to {
                return false;
            }
        }
        if let Some(from) = self.from_timestamp {
            if event.timestamp < from {
                return false;
            }
        }
        if let Some(to) = self.to_timestamp {
            if event.timestamp > to {
                return false;
            }
        }
        if event.removed && !self.include_removed {
            return false;
        }
        true
    }
}

/// Paginated filter over tracked operations.
#[derive(Debug, Clone, Default)]
pub struct OperationQuery {
    pub network: Option<String>,
    pub kind: Option<OperationKind>,
    pub status: Option<OperationStatus>,
    pub limit: Option<u64>,
    pub offset: u64,
}

impl OperationQuery {
    pub fn network(network: impl Into<String>) -> Self {
        Self {
            network: Some(network.into()),
            ..Default::default()
        }
    }

    pub fn kind(mut self, kind: OperationKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn status(mut self, status: OperationStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn matches(&self, op: &OperationRecord) -> bool {
        if let Some(network) = &self.network {
            if &op.network != network {
                return false;
            }
        }
        if let Some(kind) = self.kind {
            if op.kind != kind {
                return false;
            }
        }
        if let Some(status) = self.status {
            if op.status != status {
                return false;
            }
        }
        true
    }
}

// ─── Insert/commit results ───────────────────────────────────────────────────

/// Outcome of a single idempotent insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// The natural key already existed — a successful no-op.
    Duplicate,
}

/// Per-row accounting for a backfill batch insert. One bad row does not
/// void an otherwise-good batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchInsertReport {
    pub inserted: u64,
    pub duplicates: u64,
    pub failed: u64,
}

/// Accounting for one atomically committed block.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommitReport {
    pub events_inserted: u64,
    pub duplicates: u64,
    pub domain_inserted: u64,
}

/// One block's rows plus the checkpoint advance, applied in a single
/// transaction scope — all or nothing.
#[derive(Debug, Clone)]
pub struct BlockCommit {
    pub network: String,
    pub block_number: u64,
    pub block_hash: String,
    /// Transaction hash of the block's last log, if any.
    pub last_tx_hash: Option<String>,
    pub events: Vec<LogEvent>,
    pub domain: Vec<DomainEvent>,
}

// ─── Daily metrics rollup ────────────────────────────────────────────────────

/// Per-(network, date) indexing rollup. Updated in place for the current
/// day; previous days are append-only history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyMetrics {
    pub network: String,
    pub date: NaiveDate,
    pub blocks_processed: u64,
    pub transactions_processed: u64,
    pub events_indexed: u64,
    pub processing_time_ms: u64,
    pub avg_block_time_secs: f64,
}

impl DailyMetrics {
    pub fn new(network: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            network: network.into(),
            date,
            blocks_processed: 0,
            transactions_processed: 0,
            events_indexed: 0,
            processing_time_ms: 0,
            avg_block_time_secs: 0.0,
        }
    }

    /// Fold one processed block into the rollup.
    pub fn fold(&mut self, delta: &MetricsDelta) {
        self.blocks_processed += 1;
        self.transactions_processed += delta.transactions;
        self.events_indexed += delta.events;
        self.processing_time_ms += delta.processing_time_ms;
        if let Some(block_time) = delta.block_time_secs {
            // Incremental mean. Only blocks after the first carry an
            // interval, so the sample count is blocks_processed - 1.
            let n = self.blocks_processed.saturating_sub(1).max(1) as f64;
            self.avg_block_time_secs += (block_time - self.avg_block_time_secs) / n;
        }
    }
}

/// What one committed block contributes to the daily rollup.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsDelta {
    pub transactions: u64,
    pub events: u64,
    pub processing_time_ms: u64,
    /// Seconds since the previous block, when known.
    pub block_time_secs: Option<f64>,
}

// ─── IndexStore ──────────────────────────────────────────────────────────────

/// Storage backend contract for the indexing and monitoring engine.
#[async_trait]
pub trait IndexStore: Send + Sync {
    // Raw events

    /// Idempotent insert: an existing (network, tx_hash, log_index) is a
    /// successful no-op reported as `Duplicate`.
    async fn insert_event(&self, event: &LogEvent) -> Result<InsertOutcome, StoreError>;

    /// Backfill insert with partial-failure semantics: invalid rows are
    /// counted and skipped, valid rows commit.
    async fn insert_events_batch(
        &self,
        events: &[LogEvent],
    ) -> Result<BatchInsertReport, StoreError>;

    async fn events(&self, query: &EventQuery) -> Result<Vec<LogEvent>, StoreError>;

    async fn event_count(&self, network: Option<&str>) -> Result<u64, StoreError>;

    /// Apply one block's rows and its checkpoint advance atomically.
    async fn commit_block(&self, commit: &BlockCommit) -> Result<CommitReport, StoreError>;

    /// Reorg rewind: mark events above `rewound_to` as removed and drop the
    /// retained block hashes above it. Returns the retracted event count.
    /// Rows are never deleted.
    async fn apply_rewind(&self, network: &str, rewound_to: u64) -> Result<u64, StoreError>;

    /// Most recent retained (number, hash) pairs, ascending — seeds the
    /// reorg window after a restart.
    async fn recent_block_hashes(
        &self,
        network: &str,
        depth: u64,
    ) -> Result<Vec<(u64, String)>, StoreError>;

    // Checkpoints

    /// The network's checkpoint row, created as `initialized` at block 0 if
    /// absent.
    async fn checkpoint(&self, network: &str) -> Result<IndexerCheckpoint, StoreError>;

    /// Partial update; validation (monotonicity, status transitions) happens
    /// through [`IndexerCheckpoint::apply`].
    async fn update_checkpoint(
        &self,
        network: &str,
        patch: &CheckpointPatch,
    ) -> Result<IndexerCheckpoint, StoreError>;

    // Domain-event projections

    async fn transfers(&self, query: &EventQuery) -> Result<Vec<TransferEvent>, StoreError>;

    async fn compliance_events(
        &self,
        query: &EventQuery,
    ) -> Result<Vec<ComplianceEvent>, StoreError>;

    async fn identity_events(&self, query: &EventQuery) -> Result<Vec<IdentityEvent>, StoreError>;

    async fn claim_events(&self, query: &EventQuery) -> Result<Vec<ClaimEvent>, StoreError>;

    async fn violations(&self, query: &EventQuery) -> Result<Vec<ComplianceViolation>, StoreError>;

    async fn violation_count(&self, network: Option<&str>) -> Result<u64, StoreError>;

    // Reorg audit

    async fn insert_reorg(&self, record: &ReorgRecord) -> Result<(), StoreError>;

    async fn reorgs(&self, network: Option<&str>) -> Result<Vec<ReorgRecord>, StoreError>;

    async fn reorg_count(&self, network: Option<&str>) -> Result<u64, StoreError>;

    // Daily rollups

    /// Fold one committed block into the (network, date) rollup, creating
    /// the row on first use.
    async fn record_block_metrics(
        &self,
        network: &str,
        date: NaiveDate,
        delta: &MetricsDelta,
    ) -> Result<(), StoreError>;

    async fn daily_metrics(
        &self,
        network: &str,
        date: NaiveDate,
    ) -> Result<Option<DailyMetrics>, StoreError>;

    // Tracked operations

    /// Upsert by operation id (status progresses pending → confirmed/failed).
    async fn upsert_operation(&self, op: &OperationRecord) -> Result<(), StoreError>;

    async fn operations(&self, query: &OperationQuery) -> Result<Vec<OperationRecord>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(network: &str, block: u64) -> LogEvent {
        LogEvent {
            network: network.into(),
            address: "0xToken".into(),
            topics: vec![],
            data: "0x".into(),
            block_number: block,
            tx_hash: format!("0x{block:x}"),
            tx_index: 0,
            block_hash: "0xb".into(),
            log_index: 0,
            timestamp: 1_000 + block as i64,
            removed: false,
        }
    }

    #[test]
    fn event_query_filters() {
        let q = EventQuery::network("sepolia").block_range(100, 200);
        assert!(q.matches_event(&event("sepolia", 150)));
        assert!(!q.matches_event(&event("sepolia", 99)));
        assert!(!q.matches_event(&event("polygon", 150)));
    }

    #[test]
    fn event_query_excludes_removed_by_default() {
        let q = EventQuery::network("sepolia");
        let mut removed = event("sepolia", 100);
        removed.removed = true;
        assert!(!q.matches_event(&removed));
        assert!(q.clone().include_removed().matches_event(&removed));
    }

    #[test]
    fn daily_metrics_fold() {
        let mut day = DailyMetrics::new("sepolia", NaiveDate::from_ymd_opt(2026, 8, 6).unwrap());
        // First block after start carries no inter-block interval.
        day.fold(&MetricsDelta {
            transactions: 2,
            events: 3,
            processing_time_ms: 15,
            block_time_secs: None,
        });
        day.fold(&MetricsDelta {
            transactions: 3,
            events: 5,
            processing_time_ms: 40,
            block_time_secs: Some(12.0),
        });
        day.fold(&MetricsDelta {
            transactions: 1,
            events: 2,
            processing_time_ms: 20,
            block_time_secs: Some(14.0),
        });
        assert_eq!(day.blocks_processed, 3);
        assert_eq!(day.transactions_processed, 6);
        assert_eq!(day.events_indexed, 10);
        assert_eq!(day.processing_time_ms, 75);
        assert!((day.avg_block_time_secs - 13.0).abs() < 1e-9);
    }
}
