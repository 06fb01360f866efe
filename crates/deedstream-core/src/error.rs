//! Error types for the indexing and monitoring pipeline.

use thiserror::Error;

/// Errors raised by a storage backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A row with the same natural key already exists and the operation
    /// does not tolerate duplicates.
    #[error("duplicate row: {0}")]
    Duplicate(String),

    /// A row failed validation before it reached the backend.
    #[error("invalid row: {0}")]
    InvalidRow(String),

    /// A checkpoint status change outside the allowed transitions.
    #[error("invalid checkpoint transition: {from} → {to}")]
    InvalidTransition { from: String, to: String },

    /// A checkpoint height decrease that was not flagged as a reorg rewind.
    #[error("checkpoint for `{network}` cannot move backwards: {current} → {requested}")]
    NonMonotonic {
        network: String,
        current: u64,
        requested: u64,
    },

    #[error("storage error: {0}")]
    Backend(String),
}

/// Errors raised by the RPC client seam.
///
/// Every variant is retried by the watcher — a malformed response is a
/// failed fetch, never an empty result.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("rpc timeout after {ms}ms")]
    Timeout { ms: u64 },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("subscription closed")]
    SubscriptionClosed,
}

/// Per-network configuration errors — fatal only for the offending network.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("network name is empty")]
    EmptyName,

    #[error("network `{network}`: missing rpc url")]
    MissingRpcUrl { network: String },

    #[error("network `{network}`: invalid rpc url `{url}`")]
    InvalidRpcUrl { network: String, url: String },
}

/// Top-level error for a network's watch/ingest pipeline.
#[derive(Debug, Error)]
pub enum IndexerError {
    #[error("rpc: {0}")]
    Rpc(#[from] RpcError),

    #[error("store: {0}")]
    Store(#[from] StoreError),

    #[error("config: {0}")]
    Config(#[from] ConfigError),

    #[error("decode error in {context}: {reason}")]
    Decode { context: String, reason: String },

    #[error("watcher aborted: {reason}")]
    Aborted { reason: String },
}

impl IndexerError {
    /// Returns `true` if the watcher was asked to stop (not a failure).
    pub fn is_abort(&self) -> bool {
        matches!(self, Self::Aborted { .. })
    }
}
