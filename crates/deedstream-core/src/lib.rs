//! deedstream-core — foundation of the event indexing and monitoring engine
//! for tokenized property securities.
//!
//! # Architecture
//!
//! ```text
//! IndexerService → NetworkWatcher (one per network)
//!                      ├── ReorgDetector   (retained hash window)
//!                      ├── EventIngestor   (classify + atomic block commit)
//!                      └── IndexStore      (memory / SQLite)
//! Monitor ──────── MetricsAggregator + AlertEvaluator + sinks
//! ```

pub mod checkpoint;
pub mod config;
pub mod error;
pub mod events;
pub mod ops;
pub mod reorg;
pub mod store;
pub mod types;

pub use checkpoint::{CheckpointPatch, CheckpointStatus, IndexerCheckpoint};
pub use config::{AlertThresholds, IndexerConfig, NetworkConfig, RetentionConfig, WatchMode};
pub use error::{ConfigError, IndexerError, RpcError, StoreError};
pub use events::{Classification, DomainEvent, EventKind, SignatureRegistry};
pub use ops::{OperationKind, OperationRecord, OperationStatus};
pub use reorg::{HashWindow, PendingReorg, ReorgDetector, ReorgRecord};
pub use store::{
    BatchInsertReport, BlockCommit, CommitReport, DailyMetrics, EventQuery, IndexStore,
    InsertOutcome, MetricsDelta, OperationQuery,
};
pub use types::{BlockBatch, BlockHeader, LogEvent, PipelineEvent};
