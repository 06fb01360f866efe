//! The per-network watcher loop.
//!
//! One watcher per configured network. Each loop is strictly sequential:
//! discover the next block, verify it against the reorg window, fetch its
//! logs, hand the whole batch to the ingestor, and only then move on. A new
//! batch is never started until the previous one has committed or been
//! abandoned. Transient RPC failures retry with capped backoff — a block is
//! never skipped, since a skip would be an undetectable gap in coverage.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use deedstream_core::checkpoint::{CheckpointPatch, CheckpointStatus};
use deedstream_core::config::{NetworkConfig, WatchMode};
use deedstream_core::error::{IndexerError, RpcError, StoreError};
use deedstream_core::reorg::{PendingReorg, ReorgDetector};
use deedstream_core::store::IndexStore;
use deedstream_core::types::{BlockBatch, BlockHeader, LogEvent, PipelineEvent};

use crate::ingest::EventIngestor;
use crate::retry::RetryPolicy;
use crate::rpc::RpcClient;

/// Handle to a spawned watcher; dropping it does not stop the task.
pub struct WatcherHandle {
    network: String,
    shutdown: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl WatcherHandle {
    pub fn network(&self) -> &str {
        &self.network
    }

    /// Signal the watcher to stop and wait for it to wind down. The
    /// in-flight block either fully commits or is abandoned whole — no
    /// partially delivered batch is left behind.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.join.await;
    }
}

enum Step {
    Ingested,
    /// The block is not available yet; wait for the chain to advance.
    NotReady,
    Rewound,
}

/// Watches one network and drives its ingest pipeline.
pub struct NetworkWatcher<C: RpcClient> {
    cfg: NetworkConfig,
    rpc: Arc<C>,
    store: Arc<dyn IndexStore>,
    ingestor: EventIngestor,
    detector: ReorgDetector,
    retry: RetryPolicy,
    shutdown: watch::Receiver<bool>,
    events: broadcast::Sender<PipelineEvent>,
    next_block: u64,
    last_block_timestamp: Option<i64>,
}

impl<C: RpcClient + 'static> NetworkWatcher<C> {
    pub fn new(
        cfg: NetworkConfig,
        rpc: Arc<C>,
        store: Arc<dyn IndexStore>,
        shutdown: watch::Receiver<bool>,
        events: broadcast::Sender<PipelineEvent>,
    ) -> Self {
        Self {
            retry: RetryPolicy::from_network(&cfg),
            detector: ReorgDetector::new(cfg.reorg_window),
            ingestor: EventIngestor::new(Arc::clone(&store)),
            rpc,
            store,
            shutdown,
            events,
            next_block: 0,
            last_block_timestamp: None,
            cfg,
        }
    }

    /// Spawn the watcher onto the runtime and return its handle.
    pub fn spawn(
        cfg: NetworkConfig,
        rpc: Arc<C>,
        store: Arc<dyn IndexStore>,
        events: broadcast::Sender<PipelineEvent>,
    ) -> WatcherHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let network = cfg.name.clone();
        let watcher = Self::new(cfg, rpc, store, shutdown_rx, events);
        let join = tokio::spawn(watcher.run());
        WatcherHandle {
            network,
            shutdown: shutdown_tx,
            join,
        }
    }

    /// Run until shutdown or a persistence failure.
    pub async fn run(mut self) {
        let network = self.cfg.name.clone();
        match self.run_inner().await {
            Ok(()) => {
                info!(network, "watcher stopped");
                let patch = CheckpointPatch::status(CheckpointStatus::Stopped);
                if let Err(error) = self.store.update_checkpoint(&network, &patch).await {
                    warn!(network, %error, "failed to record stopped status");
                }
            }
            Err(e) if e.is_abort() => {
                info!(network, "watcher aborted");
                let patch = CheckpointPatch::status(CheckpointStatus::Stopped);
                if let Err(error) = self.store.update_checkpoint(&network, &patch).await {
                    warn!(network, %error, "failed to record stopped status");
                }
            }
            Err(error) => {
                // Scoped to this network; other networks keep running.
                error!(network, %error, "watcher terminated");
            }
        }
        let _ = self.events.send(PipelineEvent::Stopped { network });
    }

    async fn run_inner(&mut self) -> Result<(), IndexerError> {
        self.restore().await?;
        match self.cfg.mode {
            WatchMode::Poll => self.poll_loop().await,
            WatchMode::Subscribe => self.subscribe_loop().await,
        }
    }

    /// Resume from the durable checkpoint: set the status to running, seed
    /// the reorg window from the stored hashes, and pick the next block.
    async fn restore(&mut self) -> Result<(), IndexerError> {
        let checkpoint = self.store.checkpoint(&self.cfg.name).await?;
        self.store
            .update_checkpoint(
                &self.cfg.name,
                &CheckpointPatch::status(CheckpointStatus::Running),
            )
            .await?;
        let hashes = self
            .store
            .recent_block_hashes(&self.cfg.name, self.cfg.reorg_window as u64)
            .await?;
        self.detector.seed(&hashes);
        self.next_block = checkpoint.next_block().max(self.cfg.start_block);
        info!(
            network = %self.cfg.name,
            from_block = self.next_block,
            window = hashes.len(),
            "watcher resuming"
        );
        Ok(())
    }

    fn stopping(&self) -> bool {
        *self.shutdown.borrow()
    }

    fn aborted() -> IndexerError {
        IndexerError::Aborted {
            reason: "shutdown requested".into(),
        }
    }

    async fn poll_loop(&mut self) -> Result<(), IndexerError> {
        let interval = Duration::from_millis(self.cfg.poll_interval_ms);
        loop {
            if self.stopping() {
                return Ok(());
            }
            let head = self.fetch_head().await?;
            let target = head.saturating_sub(self.cfg.confirmations);
            self.catch_up(target).await?;

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = self.shutdown.changed() => {}
            }
        }
    }

    async fn subscribe_loop(&mut self) -> Result<(), IndexerError> {
        let mut attempt = 0u32;
        loop {
            if self.stopping() {
                return Ok(());
            }
            info!(network = %self.cfg.name, "connecting block subscription");
            let subscription = tokio::select! {
                result = self.rpc.subscribe_blocks(&self.cfg.name) => result,
                _ = self.shutdown.changed() => continue,
            };
            let mut stream = match subscription {
                Ok(stream) => stream,
                Err(error) => {
                    attempt += 1;
                    warn!(network = %self.cfg.name, %error, "subscription connect failed");
                    self.backoff(attempt).await?;
                    continue;
                }
            };
            attempt = 0;

            loop {
                use futures::StreamExt;
                let item = tokio::select! {
                    item = stream.next() => item,
                    _ = self.shutdown.changed() => return Ok(()),
                };
                match item {
                    Some(Ok(header)) => {
                        let target = header.number.saturating_sub(self.cfg.confirmations);
                        self.catch_up(target).await?;
                    }
                    Some(Err(error)) => {
                        warn!(network = %self.cfg.name, %error, "subscription stream error");
                        break;
                    }
                    None => {
                        warn!(network = %self.cfg.name, "subscription ended, reconnecting");
                        break;
                    }
                }
            }
            self.backoff(1).await?;
        }
    }

    /// Process blocks sequentially up to `target`. Malformed-data failures
    /// retry the same block after a backoff — never skipped.
    async fn catch_up(&mut self, target: u64) -> Result<(), IndexerError> {
        let mut attempt = 0u32;
        while self.next_block <= target {
            if self.stopping() {
                return Err(Self::aborted());
            }
            match self.process_block(self.next_block).await {
                Ok(Step::Ingested) | Ok(Step::Rewound) => attempt = 0,
                Ok(Step::NotReady) => return Ok(()),
                Err(e @ IndexerError::Decode { .. }) => {
                    attempt += 1;
                    warn!(
                        network = %self.cfg.name,
                        block = self.next_block,
                        error = %e,
                        "malformed block data, retrying"
                    );
                    self.backoff(attempt).await?;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Fetch, verify, and ingest one block.
    async fn process_block(&mut self, number: u64) -> Result<Step, IndexerError> {
        let header = match self.fetch_block(number).await? {
            Some(header) => header,
            None => return Ok(Step::NotReady),
        };

        if let Some(pending) = self.detector.check(&header) {
            self.handle_reorg(pending).await?;
            return Ok(Step::Rewound);
        }

        let logs = self.fetch_logs(number, header.timestamp).await?;
        let batch = BlockBatch {
            network: self.cfg.name.clone(),
            block_number: number,
            block_hash: header.hash.clone(),
            parent_hash: header.parent_hash.clone(),
            timestamp: header.timestamp,
            logs,
        };
        let block_time = self
            .last_block_timestamp
            .map(|prev| (header.timestamp - prev).max(0) as f64);

        // A hung commit counts as a persistence failure once the storage
        // timeout elapses.
        let ingest_result = match tokio::time::timeout(
            Duration::from_millis(self.cfg.store_timeout_ms),
            self.ingestor.ingest(&batch, block_time),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(IndexerError::Store(StoreError::Backend(format!(
                "storage write timed out after {}ms",
                self.cfg.store_timeout_ms
            )))),
        };
        let report = match ingest_result {
            Ok(report) => report,
            Err(IndexerError::Store(store_error)) => {
                // Persistence failure: the transaction rolled back and the
                // checkpoint did not advance. Surface it via the status and
                // stop this network; a supervisor decides when to resume.
                let message = store_error.to_string();
                if let Err(error) = self
                    .store
                    .update_checkpoint(&self.cfg.name, &CheckpointPatch::error(&message))
                    .await
                {
                    warn!(network = %self.cfg.name, %error, "failed to record error status");
                }
                let _ = self.events.send(PipelineEvent::WatcherError {
                    network: self.cfg.name.clone(),
                    message,
                });
                return Err(IndexerError::Store(store_error));
            }
            Err(other) => return Err(other),
        };

        self.detector.observe(&header);
        self.last_block_timestamp = Some(header.timestamp);
        self.next_block = number + 1;
        let _ = self.events.send(PipelineEvent::BlockIngested {
            network: self.cfg.name.clone(),
            block_number: number,
            events: report.events_inserted,
            violations: report.violations,
        });
        Ok(Step::Ingested)
    }

    /// Apply a confirmed rewind: retract stored events, record the audit
    /// row, move the checkpoint back, and resume from the fork point.
    async fn handle_reorg(&mut self, pending: PendingReorg) -> Result<(), IndexerError> {
        let record = pending.clone().into_record(&self.cfg.name);
        let retracted = self
            .store
            .apply_rewind(&self.cfg.name, pending.rewound_to)
            .await?;
        self.store.insert_reorg(&record).await?;
        self.store
            .update_checkpoint(
                &self.cfg.name,
                &CheckpointPatch::rewind_to(pending.rewound_to),
            )
            .await?;
        self.detector.apply_rewind(pending.rewound_to);
        self.next_block = pending.rewound_to + 1;
        warn!(
            network = %self.cfg.name,
            height = pending.mismatch_height,
            depth = pending.depth,
            rewound_to = pending.rewound_to,
            retracted,
            "reorg rewind applied"
        );
        let _ = self.events.send(PipelineEvent::ReorgDetected {
            network: self.cfg.name.clone(),
            height: pending.mismatch_height,
            depth: pending.depth,
            rewound_to: pending.rewound_to,
        });
        Ok(())
    }

    // ── RPC fetch helpers — retry transient failures forever ─────────────────

    async fn fetch_head(&mut self) -> Result<u64, IndexerError> {
        let mut attempt = 0u32;
        loop {
            match self.timed(self.rpc.get_block(&self.cfg.name, None)).await {
                Ok(Some(header)) => return Ok(header.number),
                Ok(None) => {
                    attempt += 1;
                    warn!(network = %self.cfg.name, "head fetch returned no block");
                }
                Err(error) => {
                    attempt += 1;
                    warn!(network = %self.cfg.name, %error, "head fetch failed");
                }
            }
            self.backoff(attempt).await?;
        }
    }

    async fn fetch_block(&mut self, number: u64) -> Result<Option<BlockHeader>, IndexerError> {
        let mut attempt = 0u32;
        loop {
            match self.timed(self.rpc.get_block(&self.cfg.name, Some(number))).await {
                Ok(result) => return Ok(result),
                Err(error) => {
                    attempt += 1;
                    warn!(network = %self.cfg.name, block = number, %error, "block fetch failed");
                    self.backoff(attempt).await?;
                }
            }
        }
    }

    async fn fetch_logs(&mut self, number: u64, timestamp: i64) -> Result<Vec<LogEvent>, IndexerError> {
        let mut attempt = 0u32;
        loop {
            let raw = match self.timed(self.rpc.get_logs(&self.cfg.name, number, number)).await {
                Ok(raw) => raw,
                Err(error) => {
                    attempt += 1;
                    warn!(network = %self.cfg.name, block = number, %error, "log fetch failed");
                    self.backoff(attempt).await?;
                    continue;
                }
            };
            // A malformed row fails this fetch; it is retried, never
            // treated as an empty result.
            let converted: Result<Vec<LogEvent>, RpcError> = raw
                .iter()
                .map(|log| log.to_log_event(&self.cfg.name, timestamp))
                .collect();
            match converted {
                Ok(mut logs) => {
                    logs.sort_by_key(|l| l.log_index);
                    return Ok(logs);
                }
                Err(error) => {
                    attempt += 1;
                    warn!(network = %self.cfg.name, block = number, %error, "malformed log response");
                    self.backoff(attempt).await?;
                }
            }
        }
    }

    async fn timed<T>(
        &self,
        fut: impl std::future::Future<Output = Result<T, RpcError>>,
    ) -> Result<T, RpcError> {
        let ms = self.cfg.rpc_timeout_ms;
        match tokio::time::timeout(Duration::from_millis(ms), fut).await {
            Ok(result) => result,
            Err(_) => Err(RpcError::Timeout { ms }),
        }
    }

    async fn backoff(&mut self, attempt: u32) -> Result<(), IndexerError> {
        if self.stopping() {
            return Err(Self::aborted());
        }
        let delay = self.retry.delay(attempt);
        tokio::select! {
            _ = tokio::time::sleep(delay) => Ok(()),
            _ = self.shutdown.changed() => Err(Self::aborted()),
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
