//! Shared types for the indexing pipeline.

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

// ─── BlockHeader ─────────────────────────────────────────────────────────────

/// A minimal block header — enough for progress tracking and reorg checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Block number.
    pub number: u64,
    /// Block hash (`0x…`).
    pub hash: String,
    /// Parent block hash (`0x…`).
    pub parent_hash: String,
    /// Unix timestamp of the block (seconds since epoch).
    pub timestamp: i64,
}

impl BlockHeader {
    /// Returns `true` if `parent` is the direct parent of `self`.
    pub fn extends(&self, parent: &BlockHeader) -> bool {
        self.number == parent.number + 1 && self.parent_hash == parent.hash
    }
}

// ─── LogEvent ────────────────────────────────────────────────────────────────

/// A raw log event as persisted in the event store.
///
/// Unique on (network, tx_hash, log_index). Immutable once written except
/// for the `removed` flag, which flips true only when a reorg retracts the
/// block that carried it. Rows are never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    /// Network slug this event came from (e.g. `"sepolia"`).
    pub network: String,
    /// Contract address that emitted the event.
    pub address: String,
    /// Ordered topic list; topics[0] is the event signature hash.
    pub topics: Vec<String>,
    /// ABI-encoded non-indexed parameters, hex with `0x` prefix.
    pub data: String,
    /// Block number.
    pub block_number: u64,
    /// Transaction hash.
    pub tx_hash: String,
    /// Transaction index within the block.
    pub tx_index: u32,
    /// Hash of the block that carried this event.
    pub block_hash: String,
    /// Log index within the block.
    pub log_index: u32,
    /// Block timestamp (Unix seconds).
    pub timestamp: i64,
    /// True once a reorg has retracted the block that carried this event.
    pub removed: bool,
}

impl LogEvent {
    /// The natural key: (network, tx_hash, log_index).
    pub fn key(&self) -> String {
        format!("{}:{}:{}", self.network, self.tx_hash, self.log_index)
    }

    /// Signature topic (topics[0]) if present.
    pub fn topic0(&self) -> Option<&str> {
        self.topics.first().map(|s| s.as_str())
    }

    /// Validate the row before it reaches a backend.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.network.is_empty() {
            return Err(StoreError::InvalidRow("network is empty".into()));
        }
        if self.address.is_empty() {
            return Err(StoreError::InvalidRow("address is empty".into()));
        }
        if !self.tx_hash.starts_with("0x") {
            return Err(StoreError::InvalidRow(format!(
                "tx_hash `{}` is not 0x-prefixed",
                self.tx_hash
            )));
        }
        Ok(())
    }
}

// ─── BlockBatch ──────────────────────────────────────────────────────────────

/// One block's worth of logs, delivered whole or not at all.
///
/// Produced by the network watcher, consumed by the event ingestor. Logs are
/// ordered by ascending log index.
#[derive(Debug, Clone)]
pub struct BlockBatch {
    pub network: String,
    pub block_number: u64,
    pub block_hash: String,
    pub parent_hash: String,
    pub timestamp: i64,
    pub logs: Vec<LogEvent>,
}

impl BlockBatch {
    /// Number of distinct transactions represented in this batch.
    pub fn tx_count(&self) -> u64 {
        let mut hashes: Vec<&str> = self.logs.iter().map(|l| l.tx_hash.as_str()).collect();
        hashes.sort_unstable();
        hashes.dedup();
        hashes.len() as u64
    }
}

// ─── PipelineEvent ───────────────────────────────────────────────────────────

/// Progress events published by each network watcher on the broadcast bus.
///
/// Consumed for observability and to drive push-mode alert evaluation.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    BlockIngested {
        network: String,
        block_number: u64,
        events: u64,
        violations: u64,
    },
    ReorgDetected {
        network: String,
        height: u64,
        depth: u64,
        rewound_to: u64,
    },
    WatcherError {
        network: String,
        message: String,
    },
    Stopped {
        network: String,
    },
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn header(number: u64, hash: &str, parent: &str) -> BlockHeader {
        BlockHeader {
            number,
            hash: hash.into(),
            parent_hash: parent.into(),
            timestamp: (number * 12) as i64,
        }
    }

    pub(crate) fn event(network: &str, block: u64, log_index: u32) -> LogEvent {
        LogEvent {
            network: network.into(),
            address: "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48".into(),
            topics: vec![],
            data: "0x".into(),
            block_number: block,
            tx_hash: format!("0x{block:064x}"),
            tx_index: 0,
            block_hash: format!("0xb{block:063x}"),
            log_index,
            timestamp: 1_700_000_000,
            removed: false,
        }
    }

    #[test]
    fn header_extends_parent() {
        let parent = header(100, "0xaaa", "0x000");
        let child = header(101, "0xbbb", "0xaaa");
        assert!(child.extends(&parent));
        assert!(!parent.extends(&child));
    }

    #[test]
    fn header_extends_false_on_gap() {
        let a = header(100, "0xaaa", "0x000");
        let b = header(102, "0xccc", "0xaaa");
        assert!(!b.extends(&a));
    }

    #[test]
    fn log_event_validation() {
        let ok = event("sepolia", 100, 0);
        assert!(ok.validate().is_ok());

        let mut bad = event("sepolia", 100, 0);
        bad.tx_hash = "abc".into();
        assert!(bad.validate().is_err());

        let mut empty = event("sepolia", 100, 0);
        empty.network = String::new();
        assert!(empty.validate().is_err());
    }

    #[test]
    fn batch_tx_count_dedupes() {
        let mut a = event("sepolia", 100, 0);
        let mut b = event("sepolia", 100, 1);
        let c = event("sepolia", 100, 2);
        a.tx_hash = "0x1".into();
        b.tx_hash = "0x1".into();
        let batch = BlockBatch {
            network: "sepolia".into(),
            block_number: 100,
            block_hash: "0xaaa".into(),
            parent_hash: "0x000".into(),
            timestamp: 0,
            logs: vec![a, b, c],
        };
        assert_eq!(batch.tx_count(), 2);
    }
}
