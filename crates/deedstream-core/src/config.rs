//! Indexer configuration — per-network watch settings, alert thresholds,
//! and cache retention.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// How a network watcher discovers new blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchMode {
    /// Poll the chain head every `poll_interval_ms`.
    Poll,
    /// Follow a block-header subscription, reconnecting on stream end.
    Subscribe,
}

impl Default for WatchMode {
    fn default() -> Self {
        Self::Poll
    }
}

/// Configuration for a single watched network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Network slug, e.g. `"sepolia"`. Used as the checkpoint key.
    pub name: String,
    /// HTTP or WebSocket RPC endpoint.
    pub rpc_url: String,
    #[serde(default)]
    pub mode: WatchMode,
    /// First block to index when no checkpoint exists yet.
    #[serde(default)]
    pub start_block: u64,
    /// Blocks behind head to wait before processing (0 = index at head and
    /// rely on reorg handling).
    #[serde(default)]
    pub confirmations: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Retained hash-comparison window for reorg detection. Reorgs deeper
    /// than this go undetected.
    #[serde(default = "default_reorg_window")]
    pub reorg_window: usize,
    #[serde(default = "default_rpc_timeout_ms")]
    pub rpc_timeout_ms: u64,
    /// Bound on one block's storage commit. A timed-out write sets the
    /// checkpoint status to `error` instead of crashing the process.
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,
    /// Initial retry backoff for transient RPC failures.
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    /// Backoff growth cap.
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    2_000
}
fn default_reorg_window() -> usize {
    32
}
fn default_rpc_timeout_ms() -> u64 {
    10_000
}
fn default_store_timeout_ms() -> u64 {
    15_000
}
fn default_backoff_ms() -> u64 {
    500
}
fn default_backoff_max_ms() -> u64 {
    30_000
}

impl NetworkConfig {
    pub fn new(name: impl Into<String>, rpc_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rpc_url: rpc_url.into(),
            mode: WatchMode::default(),
            start_block: 0,
            confirmations: 0,
            poll_interval_ms: default_poll_interval_ms(),
            reorg_window: default_reorg_window(),
            rpc_timeout_ms: default_rpc_timeout_ms(),
            store_timeout_ms: default_store_timeout_ms(),
            backoff_ms: default_backoff_ms(),
            backoff_max_ms: default_backoff_max_ms(),
        }
    }

    pub fn mode(mut self, mode: WatchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn start_block(mut self, block: u64) -> Self {
        self.start_block = block;
        self
    }

    pub fn confirmations(mut self, depth: u64) -> Self {
        self.confirmations = depth;
        self
    }

    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    pub fn reorg_window(mut self, depth: usize) -> Self {
        self.reorg_window = depth;
        self
    }

    /// Validate before the watcher starts. A failure here is fatal for this
    /// network only; other networks are unaffected.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::EmptyName);
        }
        if self.rpc_url.is_empty() {
            return Err(ConfigError::MissingRpcUrl {
                network: self.name.clone(),
            });
        }
        let valid_scheme = ["http://", "https://", "ws://", "wss://"]
            .iter()
            .any(|scheme| self.rpc_url.starts_with(scheme));
        if !valid_scheme {
            return Err(ConfigError::InvalidRpcUrl {
                network: self.name.clone(),
                url: self.rpc_url.clone(),
            });
        }
        Ok(())
    }
}

/// Alert thresholds evaluated against computed metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertThresholds {
    #[serde(default = "default_max_violations")]
    pub max_compliance_violations: u64,
    /// Percentage, 0–100.
    #[serde(default = "default_min_success_rate")]
    pub min_success_rate: f64,
    #[serde(default = "default_max_confirmation_ms")]
    pub max_confirmation_time_ms: u64,
    #[serde(default = "default_max_reorgs")]
    pub max_reorgs: u64,
    /// Percentage, 0–100.
    #[serde(default = "default_min_gas_efficiency")]
    pub min_gas_efficiency: f64,
}

fn default_max_violations() -> u64 {
    10
}
fn default_min_success_rate() -> f64 {
    95.0
}
fn default_max_confirmation_ms() -> u64 {
    60_000
}
fn default_max_reorgs() -> u64 {
    3
}
fn default_min_gas_efficiency() -> f64 {
    80.0
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            max_compliance_violations: default_max_violations(),
            min_success_rate: default_min_success_rate(),
            max_confirmation_time_ms: default_max_confirmation_ms(),
            max_reorgs: default_max_reorgs(),
            min_gas_efficiency: default_min_gas_efficiency(),
        }
    }
}

/// Retention for hot in-memory dashboard caches. The persisted store is the
/// source of truth; these bound only what is kept in RAM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

fn default_cache_capacity() -> usize {
    1_000
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            cache_capacity: default_cache_capacity(),
        }
    }
}

/// Top-level configuration for the indexing and monitoring engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexerConfig {
    pub networks: Vec<NetworkConfig>,
    #[serde(default)]
    pub thresholds: AlertThresholds,
    #[serde(default)]
    pub retention: RetentionConfig,
}

impl IndexerConfig {
    /// Config for a single network with defaults everywhere else.
    pub fn single_network(name: impl Into<String>, rpc_url: impl Into<String>) -> Self {
        Self {
            networks: vec![NetworkConfig::new(name, rpc_url)],
            thresholds: AlertThresholds::default(),
            retention: RetentionConfig::default(),
        }
    }
}
