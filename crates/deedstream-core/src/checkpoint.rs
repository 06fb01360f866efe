//! Per-network checkpoint — the durable cursor marking the last block a
//! network's pipeline has fully and atomically processed.
//!
//! Exactly one row per network. The height is monotonically non-decreasing;
//! it may only decrease as the explicit result of a confirmed reorg rewind,
//! never silently.

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Lifecycle status of a network's indexing pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointStatus {
    /// Row created, pipeline never started.
    Initialized,
    /// Actively watching and ingesting.
    Running,
    /// Temporarily suspended by an operator.
    Paused,
    /// Cleanly shut down.
    Stopped,
    /// Halted on a persistence failure; error_message carries the cause.
    Error,
}

impl CheckpointStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initialized => "initialized",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
            Self::Error => "error",
        }
    }

    /// Parse the storage representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "initialized" => Some(Self::Initialized),
            "running" => Some(Self::Running),
            "paused" => Some(Self::Paused),
            "stopped" => Some(Self::Stopped),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    /// Allowed transitions. Same-status updates are permitted so a running
    /// pipeline can refresh heights without a status change.
    ///
    /// A restart must set `Running` explicitly — there is no transition that
    /// silently reinitializes a height.
    pub fn can_transition(&self, to: CheckpointStatus) -> bool {
        use CheckpointStatus::*;
        if *self == to {
            return true;
        }
        matches!(
            (*self, to),
            (Initialized, Running)
                | (Running, Paused)
                | (Running, Stopped)
                | (Running, Error)
                | (Paused, Running)
                | (Paused, Stopped)
                | (Error, Running)
                | (Error, Stopped)
                | (Stopped, Running)
        )
    }
}

impl std::fmt::Display for CheckpointStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The persisted checkpoint row for one network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerCheckpoint {
    pub network: String,
    /// Last block whose batch fully committed.
    pub last_processed_block: u64,
    /// Transaction hash of the last log in that batch, if any.
    pub last_processed_tx_hash: Option<String>,
    pub status: CheckpointStatus,
    /// Unix timestamp of the last update.
    pub updated_at: i64,
    pub error_message: Option<String>,
}

impl IndexerCheckpoint {
    /// A fresh row for a network that has never run.
    pub fn new(network: impl Into<String>) -> Self {
        Self {
            network: network.into(),
            last_processed_block: 0,
            last_processed_tx_hash: None,
            status: CheckpointStatus::Initialized,
            updated_at: chrono::Utc::now().timestamp(),
            error_message: None,
        }
    }

    /// The next block this network's pipeline should process.
    pub fn next_block(&self) -> u64 {
        self.last_processed_block + 1
    }

    /// Apply a partial update, enforcing monotonicity and the status
    /// transition rules. Both storage backends validate through here.
    pub fn apply(&mut self, patch: &CheckpointPatch) -> Result<(), StoreError> {
        if let Some(block) = patch.last_processed_block {
            if block < self.last_processed_block && !patch.rewind {
                return Err(StoreError::NonMonotonic {
                    network: self.network.clone(),
                    current: self.last_processed_block,
                    requested: block,
                });
            }
            self.last_processed_block = block;
        }
        if let Some(status) = patch.status {
            if !self.status.can_transition(status) {
                return Err(StoreError::InvalidTransition {
                    from: self.status.as_str().into(),
                    to: status.as_str().into(),
                });
            }
            self.status = status;
            // Resuming clears the recorded failure.
            if status == CheckpointStatus::Running {
                self.error_message = None;
            }
        }
        if let Some(tx_hash) = &patch.last_processed_tx_hash {
            self.last_processed_tx_hash = Some(tx_hash.clone());
        }
        if let Some(message) = &patch.error_message {
            self.error_message = Some(message.clone());
        }
        self.updated_at = chrono::Utc::now().timestamp();
        Ok(())
    }
}

/// A partial checkpoint update — only supplied fields change.
#[derive(Debug, Clone, Default)]
pub struct CheckpointPatch {
    pub last_processed_block: Option<u64>,
    pub last_processed_tx_hash: Option<String>,
    pub status: Option<CheckpointStatus>,
    pub error_message: Option<String>,
    /// Set only by the reorg detector — permits the one legal height decrease.
    pub rewind: bool,
}

impl CheckpointPatch {
    /// Advance to a newly committed block.
    pub fn advance(block: u64, tx_hash: Option<String>) -> Self {
        Self {
            last_processed_block: Some(block),
            last_processed_tx_hash: tx_hash,
            ..Default::default()
        }
    }

    /// Change only the status.
    pub fn status(status: CheckpointStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    /// Record a failure and halt the network.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: Some(CheckpointStatus::Error),
            error_message: Some(message.into()),
            ..Default::default()
        }
    }

    /// Rewind the height after a confirmed reorg.
    pub fn rewind_to(block: u64) -> Self {
        Self {
            last_processed_block: Some(block),
            rewind: true,
            ..Default::default()
        }
    }
}
