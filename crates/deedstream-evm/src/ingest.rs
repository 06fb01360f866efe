//! The event ingestor — classifies a block batch and commits it atomically.
//!
//! For each log, ordered by ascending log index, the ingestor decodes
//! against the known signature set and builds the raw row plus any domain
//! projections. The whole batch — raw events, domain events, and the
//! checkpoint advance — is applied in a single transaction scope; if it
//! fails, nothing is considered processed and the watcher retries the
//! block.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};

use deedstream_core::error::IndexerError;
use deedstream_core::events::{Classification, DomainEvent, SignatureRegistry};
use deedstream_core::store::{BatchInsertReport, BlockCommit, IndexStore, MetricsDelta};
use deedstream_core::types::{BlockBatch, LogEvent};

/// Accounting for one ingested batch.
#[derive(Debug, Clone, Copy, Default)]
pub struct IngestReport {
    pub events_inserted: u64,
    pub duplicates: u64,
    pub domain_inserted: u64,
    /// Logs whose topic0 matched no known signature — counted, never
    /// silently discarded.
    pub unrecognized: u64,
    /// Compliance violations decoded from this batch.
    pub violations: u64,
}

/// Classifies and persists block batches for one network.
pub struct EventIngestor {
    store: Arc<dyn IndexStore>,
    registry: SignatureRegistry,
}

impl EventIngestor {
    pub fn new(store: Arc<dyn IndexStore>) -> Self {
        Self {
            store,
            registry: SignatureRegistry::new(),
        }
    }

    /// Ingest one block batch. Idempotent: redelivering an already
    /// committed batch is a successful no-op (duplicates counted).
    ///
    /// `block_time_secs` is the interval since the previous block, fed into
    /// the daily rollup when known.
    pub async fn ingest(
        &self,
        batch: &BlockBatch,
        block_time_secs: Option<f64>,
    ) -> Result<IngestReport, IndexerError> {
        let started = Instant::now();

        let mut logs = batch.logs.clone();
        logs.sort_by_key(|l| l.log_index);

        let mut domain: Vec<DomainEvent> = Vec::new();
        let mut unrecognized = 0u64;
        let mut violations = 0u64;
        for log in &logs {
            match self.registry.classify(log)? {
                Classification::Known(event) => {
                    if event.is_violation() {
                        violations += 1;
                    }
                    domain.push(event);
                }
                Classification::Unrecognized => {
                    unrecognized += 1;
                    tracing::debug!(
                        network = %batch.network,
                        block = batch.block_number,
                        log_index = log.log_index,
                        topic0 = log.topic0().unwrap_or("<none>"),
                        "unrecognized event signature"
                    );
                }
            }
        }

        let commit = BlockCommit {
            network: batch.network.clone(),
            block_number: batch.block_number,
            block_hash: batch.block_hash.clone(),
            last_tx_hash: logs.last().map(|l| l.tx_hash.clone()),
            events: logs,
            domain,
        };
        let report = self.store.commit_block(&commit).await?;

        // Daily rollup is best effort: the batch above already committed,
        // so a rollup failure is logged, never surfaced.
        let delta = MetricsDelta {
            transactions: batch.tx_count(),
            events: report.events_inserted,
            processing_time_ms: started.elapsed().as_millis() as u64,
            block_time_secs,
        };
        let date = DateTime::<Utc>::from_timestamp(batch.timestamp, 0)
            .map(|t| t.date_naive())
            .unwrap_or_else(|| Utc::now().date_naive());
        if let Err(error) = self
            .store
            .record_block_metrics(&batch.network, date, &delta)
            .await
        {
            tracing::warn!(network = %batch.network, %error, "daily metrics rollup failed");
        }

        tracing::debug!(
            network = %batch.network,
            block = batch.block_number,
            inserted = report.events_inserted,
            duplicates = report.duplicates,
            unrecognized,
            "batch ingested"
        );
        Ok(IngestReport {
            events_inserted: report.events_inserted,
            duplicates: report.duplicates,
            domain_inserted: report.domain_inserted,
            unrecognized,
            violations,
        })
    }

    /// Backfill variant with explicit partial-failure semantics: invalid
    /// rows are counted and skipped, valid rows commit.
    pub async fn ingest_batch(
        &self,
        events: &[LogEvent],
    ) -> Result<BatchInsertReport, IndexerError> {
        Ok(self.store.insert_events_batch(events).await?)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use deedstream_core::events::signature_topic;
    use deedstream_core::store::EventQuery;
    use deedstream_storage::MemoryStore;

    fn address_topic(addr: &str) -> String {
        let raw = addr.strip_prefix("0x").unwrap_or(addr);
        format!("0x{}{}", "0".repeat(64 - raw.len()), raw)
    }

    fn transfer_log(network: &str, block: u64, log_index: u32) -> LogEvent {
        LogEvent {
            network: network.into(),
            address: "0x1111111111111111111111111111111111111111".into(),
            topics: vec![
                signature_topic("Transfer(address,address,uint256)"),
                address_topic("0x2222222222222222222222222222222222222222"),
                address_topic("0x3333333333333333333333333333333333333333"),
            ],
            data: format!("0x{:064x}", 1_000),
            block_number: block,
            tx_hash: format!("0x{block:08x}{log_index:02x}"),
            tx_index: log_index,
            block_hash: format!("0xaa{block:x}"),
            log_index,
            timestamp: 1_700_000_000 + block as i64 * 12,
            removed: false,
        }
    }

    fn unknown_log(network: &str, block: u64, log_index: u32) -> LogEvent {
        let mut log = transfer_log(network, block, log_index);
        log.topics = vec![signature_topic("SomethingUnrelated(uint256)")];
        log.data = "0x".into();
        log
    }

    fn batch(network: &str, block: u64, logs: Vec<LogEvent>) -> BlockBatch {
        BlockBatch {
            network: network.into(),
            block_number: block,
            block_hash: format!("0xaa{block:x}"),
            parent_hash: format!("0xaa{:x}", block - 1),
            timestamp: 1_700_000_000 + block as i64 * 12,
            logs,
        }
    }

    #[tokio::test]
    async fn ingest_orders_by_block_and_advances_checkpoint() {
        let store = Arc::new(MemoryStore::new());
        let ingestor = EventIngestor::new(store.clone());

        for block in [100u64, 101, 102] {
            let logs = vec![transfer_log("sepolia", block, 0)];
            ingestor.ingest(&batch("sepolia", block, logs), Some(12.0)).await.unwrap();
        }

        let cp = store.checkpoint("sepolia").await.unwrap();
        assert_eq!(cp.last_processed_block, 102);
        assert_eq!(
            store.transfers(&EventQuery::network("sepolia")).await.unwrap().len(),
            3
        );
    }

    #[tokio::test]
    async fn restart_replay_is_idempotent() {
        // Two transfer logs in block 100; the identical batch redelivered
        // after a simulated restart leaves exactly two rows.
        let store = Arc::new(MemoryStore::new());
        let ingestor = EventIngestor::new(store.clone());
        let b = batch(
            "sepolia",
            100,
            vec![transfer_log("sepolia", 100, 0), transfer_log("sepolia", 100, 1)],
        );

        let first = ingestor.ingest(&b, None).await.unwrap();
        assert_eq!(first.events_inserted, 2);

        let second = ingestor.ingest(&b, None).await.unwrap();
        assert_eq!(second.events_inserted, 0);
        assert_eq!(second.duplicates, 2);

        assert_eq!(store.event_count(Some("sepolia")).await.unwrap(), 2);
        assert_eq!(
            store.checkpoint("sepolia").await.unwrap().last_processed_block,
            100
        );
    }

    #[tokio::test]
    async fn unrecognized_logs_are_counted_and_kept() {
        let store = Arc::new(MemoryStore::new());
        let ingestor = EventIngestor::new(store.clone());
        let logs = vec![
            transfer_log("sepolia", 100, 0),
            unknown_log("sepolia", 100, 1),
        ];

        let report = ingestor.ingest(&batch("sepolia", 100, logs), None).await.unwrap();
        assert_eq!(report.events_inserted, 2); // raw rows stored either way
        assert_eq!(report.domain_inserted, 1);
        assert_eq!(report.unrecognized, 1);
    }

    #[tokio::test]
    async fn malformed_known_log_fails_whole_batch() {
        let store = Arc::new(MemoryStore::new());
        let ingestor = EventIngestor::new(store.clone());
        // Known transfer signature with the indexed topics stripped.
        let mut bad = transfer_log("sepolia", 100, 0);
        bad.topics.truncate(1);

        let err = ingestor
            .ingest(&batch("sepolia", 100, vec![bad]), None)
            .await
            .unwrap_err();
        assert!(matches!(err, IndexerError::Decode { .. }));

        // Nothing committed; the checkpoint is untouched.
        assert_eq!(store.event_count(None).await.unwrap(), 0);
        assert_eq!(
            store.checkpoint("sepolia").await.unwrap().last_processed_block,
            0
        );
    }

    #[tokio::test]
    async fn daily_rollup_records_committed_blocks() {
        let store = Arc::new(MemoryStore::new());
        let ingestor = EventIngestor::new(store.clone());
        let b = batch("sepolia", 100, vec![transfer_log("sepolia", 100, 0)]);
        ingestor.ingest(&b, Some(12.0)).await.unwrap();

        let date = DateTime::<Utc>::from_timestamp(b.timestamp, 0).unwrap().date_naive();
        let day = store.daily_metrics("sepolia", date).await.unwrap().unwrap();
        assert_eq!(day.blocks_processed, 1);
        assert_eq!(day.events_indexed, 1);
    }

    #[tokio::test]
    async fn backfill_batch_reports_partial_failure() {
        let store = Arc::new(MemoryStore::new());
        let ingestor = EventIngestor::new(store.clone());
        let mut events: Vec<LogEvent> =
            (0..4).map(|i| transfer_log("sepolia", 100 + i as u64, 0)).collect();
        let mut bad = transfer_log("sepolia", 104, 0);
        bad.tx_hash = "bogus".into();
        events.push(bad);

        let report = ingestor.ingest_batch(&events).await.unwrap();
        assert_eq!(report.inserted, 4);
        assert_eq!(report.failed, 1);
    }
}
