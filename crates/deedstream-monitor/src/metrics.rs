//! Metrics aggregation — derived statistics computed on demand from the
//! authoritative store.
//!
//! Nothing here is maintained incrementally: every call recomputes from
//! persisted rows, trading recompute cost for correctness under
//! out-of-order or retried event arrival.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use deedstream_core::error::StoreError;
use deedstream_core::ops::{OperationKind, OperationStatus};
use deedstream_core::store::{IndexStore, OperationQuery};

/// Placeholder average confirmation time when no confirmed operation
/// carries both timestamps yet.
pub const DEFAULT_CONFIRMATION_MS: f64 = 30_000.0;

/// Operations at or under this gas usage count as efficient.
pub const DEFAULT_GAS_EFFICIENCY_THRESHOLD: u64 = 500_000;

/// Success rate as a percentage. Zero total events yields exactly 100 —
/// never a division error.
pub fn success_rate(confirmed: u64, failed: u64) -> f64 {
    let total = confirmed + failed;
    if total == 0 {
        return 100.0;
    }
    confirmed as f64 / total as f64 * 100.0
}

/// Snapshot of derived platform statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformMetrics {
    /// Scope of the snapshot (`None` = all networks).
    pub network: Option<String>,
    pub success_rate: f64,
    pub avg_confirmation_ms: f64,
    pub total_gas_used: u64,
    pub gas_by_network: HashMap<String, u64>,
    /// Percentage of gas-carrying operations at or under the threshold.
    pub gas_efficiency: f64,
    /// Distinct addresses appearing as from, to, or user.
    pub active_investors: u64,
    pub deployments: u64,
    pub transfers: u64,
    pub bridge_transfers: u64,
    pub identity_verifications: u64,
    pub agent_operations: u64,
    pub total_operations: u64,
}

/// Computes platform metrics from tracked operations.
pub struct MetricsAggregator {
    store: Arc<dyn IndexStore>,
    gas_threshold: u64,
}

impl MetricsAggregator {
    pub fn new(store: Arc<dyn IndexStore>) -> Self {
        Self {
            store,
            gas_threshold: DEFAULT_GAS_EFFICIENCY_THRESHOLD,
        }
    }

    pub fn gas_threshold(mut self, threshold: u64) -> Self {
        self.gas_threshold = threshold;
        self
    }

    /// Recompute the full snapshot for one network (`None` = global).
    pub async fn compute(&self, network: Option<&str>) -> Result<PlatformMetrics, StoreError> {
        let query = OperationQuery {
            network: network.map(String::from),
            ..Default::default()
        };
        let ops = self.store.operations(&query).await?;

        let confirmed = ops
            .iter()
            .filter(|op| op.status == OperationStatus::Confirmed)
            .count() as u64;
        let failed = ops
            .iter()
            .filter(|op| op.status == OperationStatus::Failed)
            .count() as u64;

        let confirmation_times: Vec<u64> =
            ops.iter().filter_map(|op| op.confirmation_ms()).collect();
        let avg_confirmation_ms = if confirmation_times.is_empty() {
            DEFAULT_CONFIRMATION_MS
        } else {
            confirmation_times.iter().sum::<u64>() as f64 / confirmation_times.len() as f64
        };

        let mut total_gas_used = 0u64;
        let mut gas_by_network: HashMap<String, u64> = HashMap::new();
        let mut gas_carrying = 0u64;
        let mut efficient = 0u64;
        for op in &ops {
            if let Some(gas) = op.gas_used {
                total_gas_used += gas;
                *gas_by_network.entry(op.network.clone()).or_default() += gas;
                gas_carrying += 1;
                if gas <= self.gas_threshold {
                    efficient += 1;
                }
            }
        }
        let gas_efficiency = if gas_carrying == 0 {
            100.0
        } else {
            efficient as f64 / gas_carrying as f64 * 100.0
        };

        let investors: HashSet<String> = ops
            .iter()
            .flat_map(|op| op.addresses().map(str::to_ascii_lowercase))
            .collect();

        let confirmed_count = |kind: OperationKind| {
            ops.iter()
                .filter(|op| op.kind == kind && op.status == OperationStatus::Confirmed)
                .count() as u64
        };

        Ok(PlatformMetrics {
            network: network.map(String::from),
            success_rate: success_rate(confirmed, failed),
            avg_confirmation_ms,
            total_gas_used,
            gas_by_network,
            gas_efficiency,
            active_investors: investors.len() as u64,
            deployments: confirmed_count(OperationKind::Deployment),
            transfers: confirmed_count(OperationKind::Transfer),
            bridge_transfers: confirmed_count(OperationKind::BridgeTransfer),
            identity_verifications: confirmed_count(OperationKind::IdentityVerification),
            agent_operations: confirmed_count(OperationKind::AgentOperation),
            total_operations: ops.len() as u64,
        })
    }
}

// ─── Cross-service aggregation ───────────────────────────────────────────────

/// Per-service rollup merged across independent metric sources (e.g. one
/// per deployment region or per network cluster).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceMetrics {
    pub total_deployments: u64,
    pub total_transfers: u64,
    pub total_gas_used: u64,
    pub active_networks: BTreeSet<String>,
}

impl ServiceMetrics {
    /// Sum the totals and union the network sets — a network present in
    /// several sources counts once.
    pub fn merge(sources: impl IntoIterator<Item = ServiceMetrics>) -> ServiceMetrics {
        let mut merged = ServiceMetrics::default();
        for source in sources {
            merged.total_deployments += source.total_deployments;
            merged.total_transfers += source.total_transfers;
            merged.total_gas_used += source.total_gas_used;
            merged.active_networks.extend(source.active_networks);
        }
        merged
    }
}

impl From<&PlatformMetrics> for ServiceMetrics {
    fn from(metrics: &PlatformMetrics) -> Self {
        Self {
            total_deployments: metrics.deployments,
            total_transfers: metrics.transfers,
            total_gas_used: metrics.total_gas_used,
            active_networks: metrics.gas_by_network.keys().cloned().collect(),
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use deedstream_core::ops::OperationRecord;
    use deedstream_storage::MemoryStore;

    fn op(
        id: &str,
        network: &str,
        kind: OperationKind,
        status: OperationStatus,
        gas: Option<u64>,
    ) -> OperationRecord {
        OperationRecord {
            id: id.into(),
            kind,
            status,
            network: network.into(),
            from: Some("0xAAA1".into()),
            to: Some("0xBBB2".into()),
            user: None,
            gas_used: gas,
            started_at: 1_700_000_000,
            confirmed_at: (status == OperationStatus::Confirmed).then_some(1_700_000_020),
        }
    }

    #[test]
    fn success_rate_zero_events_is_exactly_100() {
        let rate = success_rate(0, 0);
        assert_eq!(rate, 100.0);
        assert!(!rate.is_nan());
    }

    #[test]
    fn success_rate_mixed() {
        assert!((success_rate(3, 1) - 75.0).abs() < 1e-9);
        assert_eq!(success_rate(0, 5), 0.0);
    }

    #[tokio::test]
    async fn empty_store_yields_boundary_defaults() {
        let store = Arc::new(MemoryStore::new());
        let metrics = MetricsAggregator::new(store).compute(None).await.unwrap();
        assert_eq!(metrics.success_rate, 100.0);
        assert_eq!(metrics.avg_confirmation_ms, DEFAULT_CONFIRMATION_MS);
        assert_eq!(metrics.gas_efficiency, 100.0);
        assert_eq!(metrics.active_investors, 0);
        assert_eq!(metrics.total_operations, 0);
    }

    #[tokio::test]
    async fn aggregates_tracked_operations() {
        let store = Arc::new(MemoryStore::new());
        for record in [
            op("1", "sepolia", OperationKind::Deployment, OperationStatus::Confirmed, Some(400_000)),
            op("2", "sepolia", OperationKind::Transfer, OperationStatus::Confirmed, Some(65_000)),
            op("3", "sepolia", OperationKind::Transfer, OperationStatus::Failed, Some(800_000)),
            op("4", "polygon", OperationKind::Transfer, OperationStatus::Confirmed, Some(70_000)),
            op("5", "polygon", OperationKind::IdentityVerification, OperationStatus::Pending, None),
        ] {
            store.upsert_operation(&record).await.unwrap();
        }

        let metrics = MetricsAggregator::new(store.clone()).compute(None).await.unwrap();
        // 3 confirmed, 1 failed (pending excluded from the rate).
        assert!((metrics.success_rate - 75.0).abs() < 1e-9);
        assert_eq!(metrics.total_gas_used, 1_335_000);
        assert_eq!(metrics.gas_by_network["sepolia"], 1_265_000);
        assert_eq!(metrics.gas_by_network["polygon"], 70_000);
        // 3 of 4 gas-carrying ops are at or under 500k.
        assert!((metrics.gas_efficiency - 75.0).abs() < 1e-9);
        assert_eq!(metrics.deployments, 1);
        assert_eq!(metrics.transfers, 2); // confirmed only
        assert_eq!(metrics.identity_verifications, 0); // pending excluded
        assert_eq!(metrics.active_investors, 2);

        // Network-scoped snapshot sees only that network's rows.
        let sepolia = MetricsAggregator::new(store).compute(Some("sepolia")).await.unwrap();
        assert_eq!(sepolia.total_operations, 3);
        assert_eq!(sepolia.transfers, 1);
    }

    #[tokio::test]
    async fn confirmation_time_averages_when_present() {
        let store = Arc::new(MemoryStore::new());
        let mut a = op("1", "sepolia", OperationKind::Transfer, OperationStatus::Confirmed, None);
        a.confirmed_at = Some(a.started_at + 10); // 10s
        let mut b = op("2", "sepolia", OperationKind::Transfer, OperationStatus::Confirmed, None);
        b.confirmed_at = Some(b.started_at + 30); // 30s
        store.upsert_operation(&a).await.unwrap();
        store.upsert_operation(&b).await.unwrap();

        let metrics = MetricsAggregator::new(store).compute(None).await.unwrap();
        assert!((metrics.avg_confirmation_ms - 20_000.0).abs() < 1e-9);
    }

    #[test]
    fn cross_service_merge_unions_networks() {
        let mut a = ServiceMetrics {
            total_deployments: 3,
            total_transfers: 10,
            total_gas_used: 1_000,
            active_networks: BTreeSet::new(),
        };
        a.active_networks.insert("sepolia".into());
        a.active_networks.insert("polygon".into());

        let mut b = ServiceMetrics {
            total_deployments: 2,
            total_transfers: 4,
            total_gas_used: 500,
            active_networks: BTreeSet::new(),
        };
        b.active_networks.insert("sepolia".into()); // present in both

        let merged = ServiceMetrics::merge([a, b]);
        assert_eq!(merged.total_deployments, 5);
        assert_eq!(merged.total_transfers, 14);
        assert_eq!(merged.total_gas_used, 1_500);
        assert_eq!(merged.active_networks.len(), 2); // no double count
    }
}
