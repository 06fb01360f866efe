//! deedstream-evm — the EVM-facing side of the indexing engine: the RPC
//! client seam, per-network watcher loop, event ingestor, and the
//! multi-network service runner.

pub mod ingest;
pub mod retry;
pub mod rpc;
pub mod service;
pub mod watcher;

pub use ingest::{EventIngestor, IngestReport};
pub use retry::RetryPolicy;
pub use rpc::{HeaderStream, RawLog, RpcClient};
pub use service::IndexerService;
pub use watcher::{NetworkWatcher, WatcherHandle};
