//! In-memory storage backend.
//!
//! All tables live under one mutex so a block commit is atomic by
//! construction. Data is lost when the process exits; useful for tests and
//! short-lived indexers.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;

use deedstream_core::checkpoint::{CheckpointPatch, IndexerCheckpoint};
use deedstream_core::error::StoreError;
use deedstream_core::events::{
    ClaimEvent, ComplianceEvent, ComplianceViolation, DomainEvent, IdentityEvent, Provenance,
    TransferEvent,
};
use deedstream_core::ops::OperationRecord;
use deedstream_core::reorg::ReorgRecord;
use deedstream_core::store::{
    BatchInsertReport, BlockCommit, CommitReport, DailyMetrics, EventQuery, IndexStore,
    InsertOutcome, MetricsDelta, OperationQuery,
};
use deedstream_core::types::LogEvent;

#[derive(Default)]
struct Inner {
    events: Vec<LogEvent>,
    event_keys: HashSet<String>,
    /// network → block number → hash (reorg window source).
    block_hashes: HashMap<String, BTreeMap<u64, String>>,
    checkpoints: HashMap<String, IndexerCheckpoint>,
    transfers: Vec<TransferEvent>,
    compliance: Vec<ComplianceEvent>,
    identities: Vec<IdentityEvent>,
    claims: Vec<ClaimEvent>,
    violations: Vec<ComplianceViolation>,
    domain_keys: HashSet<String>,
    reorgs: Vec<ReorgRecord>,
    daily: HashMap<(String, NaiveDate), DailyMetrics>,
    operations: HashMap<String, OperationRecord>,
}

/// In-memory indexer storage.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn domain_key(event: &DomainEvent) -> String {
    let kind = match event {
        DomainEvent::Transfer(_) => "transfer",
        DomainEvent::Compliance(_) => "compliance",
        DomainEvent::Identity(_) => "identity",
        DomainEvent::Claim(_) => "claim",
        DomainEvent::Violation(_) => "violation",
    };
    format!("{kind}:{}", event.provenance().key())
}

/// Provenance-level filtering shared by the domain-event queries.
fn matches_provenance(query: &EventQuery, prov: &Provenance) -> bool {
    if let Some(network) = &query.network {
        if &prov.network != network {
            return false;
        }
    }
    if let Some(from) = query.from_block {
        if prov.block_number < from {
            return false;
        }
    }
    if let Some(to) = query.to_block {
        if prov.block_number > to {
            return false;
        }
    }
    if let Some(from) = query.from_timestamp {
        if prov.timestamp < from {
            return false;
        }
    }
    if let Some(to) = query.to_timestamp {
        if prov.timestamp > to {
            return false;
        }
    }
    true
}

fn addr_eq(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

fn paginate<T>(mut rows: Vec<T>, query: &EventQuery) -> Vec<T> {
    let offset = query.offset as usize;
    if offset >= rows.len() {
        return Vec::new();
    }
    rows.drain(..offset);
    if let Some(limit) = query.limit {
        rows.truncate(limit as usize);
    }
    rows
}

impl Inner {
    fn insert_event_row(&mut self, event: &LogEvent) -> Result<InsertOutcome, StoreError> {
        event.validate()?;
        if !self.event_keys.insert(event.key()) {
            return Ok(InsertOutcome::Duplicate);
        }
        self.events.push(event.clone());
        Ok(InsertOutcome::Inserted)
    }

    fn insert_domain_row(&mut self, event: &DomainEvent) -> bool {
        if !self.domain_keys.insert(domain_key(event)) {
            return false;
        }
        match event {
            DomainEvent::Transfer(e) => self.transfers.push(e.clone()),
            DomainEvent::Compliance(e) => self.compliance.push(e.clone()),
            DomainEvent::Identity(e) => self.identities.push(e.clone()),
            DomainEvent::Claim(e) => self.claims.push(e.clone()),
            DomainEvent::Violation(e) => self.violations.push(e.clone()),
        }
        true
    }

    fn checkpoint_entry(&mut self, network: &str) -> &mut IndexerCheckpoint {
        self.checkpoints
            .entry(network.to_string())
            .or_insert_with(|| IndexerCheckpoint::new(network))
    }
}

#[async_trait]
impl IndexStore for MemoryStore {
    async fn insert_event(&self, event: &LogEvent) -> Result<InsertOutcome, StoreError> {
        self.inner.lock().unwrap().insert_event_row(event)
    }

    async fn insert_events_batch(
        &self,
        events: &[LogEvent],
    ) -> Result<BatchInsertReport, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let mut report = BatchInsertReport::default();
        for event in events {
            match inner.insert_event_row(event) {
                Ok(InsertOutcome::Inserted) => report.inserted += 1,
                Ok(InsertOutcome::Duplicate) => report.duplicates += 1,
                Err(error) => {
                    tracing::warn!(%error, "skipping invalid event row");
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }

    async fn events(&self, query: &EventQuery) -> Result<Vec<LogEvent>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut rows: Vec<LogEvent> = inner
            .events
            .iter()
            .filter(|e| query.matches_event(e))
            .cloned()
            .collect();
        rows.sort_by_key(|e| (e.block_number, e.log_index));
        Ok(paginate(rows, query))
    }

    async fn event_count(&self, network: Option<&str>) -> Result<u64, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .events
            .iter()
            .filter(|e| network.map_or(true, |n| e.network == n))
            .count() as u64)
    }

    async fn commit_block(&self, commit: &BlockCommit) -> Result<CommitReport, StoreError> {
        let mut inner = self.inner.lock().unwrap();

        // Validate rows and the checkpoint advance before touching any
        // table so a rejected commit leaves nothing behind.
        for event in &commit.events {
            event.validate()?;
        }
        let mut checkpoint = inner.checkpoint_entry(&commit.network).clone();
        checkpoint.apply(&CheckpointPatch::advance(
            commit.block_number,
            commit.last_tx_hash.clone(),
        ))?;

        let mut report = CommitReport::default();
        for event in &commit.events {
            match inner.insert_event_row(event)? {
                InsertOutcome::Inserted => report.events_inserted += 1,
                InsertOutcome::Duplicate => report.duplicates += 1,
            }
        }
        for event in &commit.domain {
            if inner.insert_domain_row(event) {
                report.domain_inserted += 1;
            }
        }
        inner
            .block_hashes
            .entry(commit.network.clone())
            .or_default()
            .insert(commit.block_number, commit.block_hash.clone());
        inner
            .checkpoints
            .insert(commit.network.clone(), checkpoint);
        Ok(report)
    }

    async fn apply_rewind(&self, network: &str, rewound_to: u64) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let mut retracted = 0u64;
        for event in inner.events.iter_mut() {
            if event.network == network && event.block_number > rewound_to && !event.removed {
                event.removed = true;
                retracted += 1;
            }
        }
        if let Some(hashes) = inner.block_hashes.get_mut(network) {
            hashes.retain(|number, _| *number <= rewound_to);
        }
        Ok(retracted)
    }

    async fn recent_block_hashes(
        &self,
        network: &str,
        depth: u64,
    ) -> Result<Vec<(u64, String)>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let Some(hashes) = inner.block_hashes.get(network) else {
            return Ok(Vec::new());
        };
        let mut rows: Vec<(u64, String)> = hashes
            .iter()
            .rev()
            .take(depth as usize)
            .map(|(n, h)| (*n, h.clone()))
            .collect();
        rows.reverse();
        Ok(rows)
    }

    async fn checkpoint(&self, network: &str) -> Result<IndexerCheckpoint, StoreError> {
        Ok(self.inner.lock().unwrap().checkpoint_entry(network).clone())
    }

    async fn update_checkpoint(
        &self,
        network: &str,
        patch: &CheckpointPatch,
    ) -> Result<IndexerCheckpoint, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let mut checkpoint = inner.checkpoint_entry(network).clone();
        checkpoint.apply(patch)?;
        inner
            .checkpoints
            .insert(network.to_string(), checkpoint.clone());
        Ok(checkpoint)
    }

    async fn transfers(&self, query: &EventQuery) -> Result<Vec<TransferEvent>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut rows: Vec<TransferEvent> = inner
            .transfers
            .iter()
            .filter(|t| matches_provenance(query, &t.provenance))
            .filter(|t| {
                query.address.as_ref().map_or(true, |a| {
                    addr_eq(&t.token, a) || addr_eq(&t.from, a) || addr_eq(&t.to, a)
                })
            })
            .cloned()
            .collect();
        rows.sort_by_key(|t| (t.provenance.block_number, t.provenance.log_index));
        Ok(paginate(rows, query))
    }

    async fn compliance_events(
        &self,
        query: &EventQuery,
    ) -> Result<Vec<ComplianceEvent>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut rows: Vec<ComplianceEvent> = inner
            .compliance
            .iter()
            .filter(|c| matches_provenance(query, &c.provenance))
            .filter(|c| query.address.as_ref().map_or(true, |a| addr_eq(&c.module, a)))
            .cloned()
            .collect();
        rows.sort_by_key(|c| (c.provenance.block_number, c.provenance.log_index));
        Ok(paginate(rows, query))
    }

    async fn identity_events(&self, query: &EventQuery) -> Result<Vec<IdentityEvent>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut rows: Vec<IdentityEvent> = inner
            .identities
            .iter()
            .filter(|i| matches_provenance(query, &i.provenance))
            .filter(|i| {
                query
                    .address
                    .as_ref()
                    .map_or(true, |a| addr_eq(&i.investor, a) || addr_eq(&i.identity, a))
            })
            .cloned()
            .collect();
        rows.sort_by_key(|i| (i.provenance.block_number, i.provenance.log_index));
        Ok(paginate(rows, query))
    }

    async fn claim_events(&self, query: &EventQuery) -> Result<Vec<ClaimEvent>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut rows: Vec<ClaimEvent> = inner
            .claims
            .iter()
            .filter(|c| matches_provenance(query, &c.provenance))
            .filter(|c| {
                query
                    .address
                    .as_ref()
                    .map_or(true, |a| addr_eq(&c.identity, a) || addr_eq(&c.issuer, a))
            })
            .cloned()
            .collect();
        rows.sort_by_key(|c| (c.provenance.block_number, c.provenance.log_index));
        Ok(paginate(rows, query))
    }

    async fn violations(&self, query: &EventQuery) -> Result<Vec<ComplianceViolation>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut rows: Vec<ComplianceViolation> = inner
            .violations
            .iter()
            .filter(|v| matches_provenance(query, &v.provenance))
            .filter(|v| {
                query.address.as_ref().map_or(true, |a| {
                    addr_eq(&v.token, a) || addr_eq(&v.from, a) || addr_eq(&v.to, a)
                })
            })
            .cloned()
            .collect();
        rows.sort_by_key(|v| (v.provenance.block_number, v.provenance.log_index));
        Ok(paginate(rows, query))
    }

    async fn violation_count(&self, network: Option<&str>) -> Result<u64, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .violations
            .iter()
            .filter(|v| network.map_or(true, |n| v.provenance.network == n))
            .count() as u64)
    }

    async fn insert_reorg(&self, record: &ReorgRecord) -> Result<(), StoreError> {
        self.inner.lock().unwrap().reorgs.push(record.clone());
        Ok(())
    }

    async fn reorgs(&self, network: Option<&str>) -> Result<Vec<ReorgRecord>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .reorgs
            .iter()
            .filter(|r| network.map_or(true, |n| r.network == n))
            .cloned()
            .collect())
    }

    async fn reorg_count(&self, network: Option<&str>) -> Result<u64, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .reorgs
            .iter()
            .filter(|r| network.map_or(true, |n| r.network == n))
            .count() as u64)
    }

    async fn record_block_metrics(
        &self,
        network: &str,
        date: NaiveDate,
        delta: &MetricsDelta,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let day = inner
            .daily
            .entry((network.to_string(), date))
            .or_insert_with(|| DailyMetrics::new(network, date));
        day.fold(delta);
        Ok(())
    }

    async fn daily_metrics(
        &self,
        network: &str,
        date: NaiveDate,
    ) -> Result<Option<DailyMetrics>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.daily.get(&(network.to_string(), date)).cloned())
    }

    async fn upsert_operation(&self, op: &OperationRecord) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.operations.insert(op.id.clone(), op.clone());
        Ok(())
    }

    async fn operations(&self, query: &OperationQuery) -> Result<Vec<OperationRecord>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut rows: Vec<OperationRecord> = inner
            .operations
            .values()
            .filter(|op| query.matches(op))
            .cloned()
            .collect();
        rows.sort_by_key(|op| (op.started_at, op.id.clone()));
        let offset = query.offset as usize;
        if offset >= rows.len() {
            return Ok(Vec::new());
        }
        rows.drain(..offset);
        if let Some(limit) = query.limit {
            rows.truncate(limit as usize);
        }
        Ok(rows)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
