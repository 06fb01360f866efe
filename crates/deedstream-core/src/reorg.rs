//! Reorg detection — compares newly observed block hashes against the
//! retained window of previously recorded ones and computes the rewind.
//!
//! Detection is best-effort: a reorg deeper than the retained window, or
//! one that occurs and resolves entirely between two restarts, can go
//! undetected. The window depth is configurable; widening it is the only
//! way to catch deeper forks.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::types::BlockHeader;

// ─── HashWindow ──────────────────────────────────────────────────────────────

/// Bounded window of recently recorded (block number, hash) pairs for one
/// network, oldest first.
pub struct HashWindow {
    window: VecDeque<(u64, String)>,
    capacity: usize,
}

impl HashWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            window: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Record a block hash, evicting the oldest entry when full. A repeated
    /// height replaces the previous entry (post-rewind re-ingestion).
    pub fn push(&mut self, number: u64, hash: impl Into<String>) {
        if let Some(entry) = self.window.iter_mut().find(|(n, _)| *n == number) {
            entry.1 = hash.into();
            return;
        }
        if self.window.len() >= self.capacity {
            self.window.pop_front();
        }
        self.window.push_back((number, hash.into()));
    }

    /// The recorded hash at a height, if still retained.
    pub fn hash_at(&self, number: u64) -> Option<&str> {
        self.window
            .iter()
            .find(|(n, _)| *n == number)
            .map(|(_, h)| h.as_str())
    }

    /// Highest retained block number.
    pub fn head(&self) -> Option<u64> {
        self.window.back().map(|(n, _)| *n)
    }

    /// Lowest retained block number.
    pub fn oldest(&self) -> Option<u64> {
        self.window.front().map(|(n, _)| *n)
    }

    /// Drop every entry above `number` (reorg rewind).
    pub fn rewind_to(&mut self, number: u64) {
        while let Some((back, _)) = self.window.back() {
            if *back > number {
                self.window.pop_back();
            } else {
                break;
            }
        }
    }

    /// Greatest retained height whose hash equals `hash` — the fork point
    /// when called with a new block's parent hash.
    fn find_hash(&self, hash: &str) -> Option<u64> {
        self.window
            .iter()
            .rev()
            .find(|(_, h)| h == hash)
            .map(|(n, _)| *n)
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }
}

// ─── ReorgDetector ───────────────────────────────────────────────────────────

/// A detected reorganization, pending rewind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingReorg {
    /// Height at which the recorded and observed hashes diverge.
    pub mismatch_height: u64,
    /// The hash previously recorded at that height.
    pub old_hash: String,
    /// The hash the new canonical chain carries there.
    pub new_hash: String,
    /// Number of recorded blocks being retracted.
    pub depth: u64,
    /// Checkpoint target: blocks above this are invalidated.
    pub rewound_to: u64,
}

/// Audit record appended on every confirmed rewind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReorgRecord {
    pub network: String,
    pub height: u64,
    pub old_hash: String,
    pub new_hash: String,
    pub depth: u64,
    pub rewound_to: u64,
    pub detected_at: i64,
}

impl PendingReorg {
    pub fn into_record(self, network: impl Into<String>) -> ReorgRecord {
        ReorgRecord {
            network: network.into(),
            height: self.mismatch_height,
            old_hash: self.old_hash,
            new_hash: self.new_hash,
            depth: self.depth,
            rewound_to: self.rewound_to,
            detected_at: chrono::Utc::now().timestamp(),
        }
    }
}

/// Detects chain reorganizations for one network.
pub struct ReorgDetector {
    window: HashWindow,
}

impl ReorgDetector {
    pub fn new(window_depth: usize) -> Self {
        Self {
            window: HashWindow::new(window_depth),
        }
    }

    /// Rebuild the window from the store's recent hashes (ascending) after
    /// a restart.
    pub fn seed(&mut self, hashes: &[(u64, String)]) {
        for (number, hash) in hashes {
            self.window.push(*number, hash.clone());
        }
    }

    /// Check an observed header against the retained window before it is
    /// ingested. Returns the pending rewind on a mismatch, `None` when the
    /// chain is consistent or the window holds nothing to compare.
    pub fn check(&self, header: &BlockHeader) -> Option<PendingReorg> {
        // Same-height comparison: a redelivered height with a new hash.
        if let Some(old) = self.window.hash_at(header.number) {
            if old != header.hash {
                return Some(self.pending(header.number, old.to_string(), header.hash.clone(), header));
            }
            return None;
        }
        // Parent comparison: the next height must extend the recorded head.
        if header.number == 0 {
            return None;
        }
        if let Some(prev) = self.window.hash_at(header.number - 1) {
            if prev != header.parent_hash {
                return Some(self.pending(
                    header.number - 1,
                    prev.to_string(),
                    header.parent_hash.clone(),
                    header,
                ));
            }
        }
        None
    }

    /// Record a header the pipeline accepted as canonical.
    pub fn observe(&mut self, header: &BlockHeader) {
        self.window.push(header.number, header.hash.clone());
    }

    /// Apply a confirmed rewind to the retained window.
    pub fn apply_rewind(&mut self, rewound_to: u64) {
        self.window.rewind_to(rewound_to);
    }

    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    fn pending(
        &self,
        mismatch_height: u64,
        old_hash: String,
        new_hash: String,
        header: &BlockHeader,
    ) -> PendingReorg {
        // Walk the window for the fork point via the new chain's parent
        // hash. Not found means the fork is at or below the window edge;
        // rewind one block below the mismatch and let the next iteration
        // re-check from there.
        let rewound_to = match self.window.find_hash(&header.parent_hash) {
            Some(fork) if fork < mismatch_height => fork,
            _ => mismatch_height.saturating_sub(1),
        };
        let depth = mismatch_height - rewound_to;
        tracing::warn!(
            height = mismatch_height,
            old = %old_hash,
            new = %new_hash,
            depth,
            rewound_to,
            "reorg detected"
        );
        PendingReorg {
            mismatch_height,
            old_hash,
            new_hash,
            depth,
            rewound_to,
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
