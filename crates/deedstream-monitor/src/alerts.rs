//! Alert evaluation — compares computed metrics against configured
//! thresholds and emits anomalies.
//!
//! Alerts are **edge-triggered**: each condition fires when it transitions
//! from clear to breached and re-arms only once it clears again. A
//! condition that keeps holding does not re-fire on every evaluation.

use std::collections::HashSet;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use deedstream_core::config::AlertThresholds;
use deedstream_core::events::ComplianceViolation;

use crate::metrics::PlatformMetrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// An emitted anomaly. Ephemeral — delivered to sinks, logged for audit,
/// not required to be queryable state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub severity: Severity,
    pub message: String,
    pub details: serde_json::Value,
    pub timestamp: i64,
    pub network: Option<String>,
}

impl Alert {
    fn new(severity: Severity, message: impl Into<String>, details: serde_json::Value, network: Option<&str>) -> Self {
        Self {
            severity,
            message: message.into(),
            details,
            timestamp: chrono::Utc::now().timestamp(),
            network: network.map(String::from),
        }
    }
}

/// The monitored conditions, keyed per network scope for edge tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Condition {
    Violations,
    SuccessRate,
    ConfirmationTime,
    ReorgCount,
    GasEfficiency,
}

/// Evaluates metrics against thresholds with edge-triggered re-fire
/// semantics.
pub struct AlertEvaluator {
    thresholds: AlertThresholds,
    breached: Mutex<HashSet<(String, Condition)>>,
}

impl AlertEvaluator {
    pub fn new(thresholds: AlertThresholds) -> Self {
        Self {
            thresholds,
            breached: Mutex::new(HashSet::new()),
        }
    }

    pub fn thresholds(&self) -> &AlertThresholds {
        &self.thresholds
    }

    /// Evaluate one scope. Returns the alerts that fired on this call
    /// (newly breached conditions only).
    pub fn evaluate(
        &self,
        network: Option<&str>,
        metrics: &PlatformMetrics,
        violations: &[ComplianceViolation],
        reorg_count: u64,
    ) -> Vec<Alert> {
        let scope = network.unwrap_or("").to_string();
        let mut alerts = Vec::new();
        let mut breached = self.breached.lock().unwrap();

        let mut edge = |condition: Condition, is_breached: bool, make: &dyn Fn() -> Alert| {
            let key = (scope.clone(), condition);
            if is_breached {
                if breached.insert(key) {
                    alerts.push(make());
                }
            } else {
                breached.remove(&key);
            }
        };

        let violation_count = violations.len() as u64;
        edge(
            Condition::Violations,
            violation_count >= self.thresholds.max_compliance_violations,
            &|| {
                // Reference the most recent `max` violations in the details.
                let window = self.thresholds.max_compliance_violations as usize;
                let start = violations.len().saturating_sub(window);
                let recent: Vec<serde_json::Value> = violations[start..]
                    .iter()
                    .map(|v| {
                        serde_json::json!({
                            "tx_hash": v.provenance.tx_hash,
                            "block_number": v.provenance.block_number,
                            "from": v.from,
                            "to": v.to,
                            "amount": v.amount,
                            "reason": v.reason,
                        })
                    })
                    .collect();
                Alert::new(
                    Severity::Critical,
                    format!(
                        "compliance violations reached {violation_count} (threshold {})",
                        self.thresholds.max_compliance_violations
                    ),
                    serde_json::json!({ "violations": recent }),
                    network,
                )
            },
        );

        edge(
            Condition::SuccessRate,
            metrics.success_rate < self.thresholds.min_success_rate,
            &|| {
                Alert::new(
                    Severity::Critical,
                    format!(
                        "success rate {:.1}% below minimum {:.1}%",
                        metrics.success_rate, self.thresholds.min_success_rate
                    ),
                    serde_json::json!({
                        "success_rate": metrics.success_rate,
                        "min_success_rate": self.thresholds.min_success_rate,
                    }),
                    network,
                )
            },
        );

        edge(
            Condition::ConfirmationTime,
            metrics.avg_confirmation_ms > self.thresholds.max_confirmation_time_ms as f64,
            &|| {
                Alert::new(
                    Severity::Warning,
                    format!(
                        "average confirmation time {:.0}ms exceeds {}ms",
                        metrics.avg_confirmation_ms, self.thresholds.max_confirmation_time_ms
                    ),
                    serde_json::json!({
                        "avg_confirmation_ms": metrics.avg_confirmation_ms,
                        "max_confirmation_time_ms": self.thresholds.max_confirmation_time_ms,
                    }),
                    network,
                )
            },
        );

        edge(
            Condition::ReorgCount,
            reorg_count > self.thresholds.max_reorgs,
            &|| {
                Alert::new(
                    Severity::Warning,
                    format!(
                        "{reorg_count} reorgs observed (threshold {})",
                        self.thresholds.max_reorgs
                    ),
                    serde_json::json!({
                        "reorg_count": reorg_count,
                        "max_reorgs": self.thresholds.max_reorgs,
                    }),
                    network,
                )
            },
        );

        edge(
            Condition::GasEfficiency,
            metrics.gas_efficiency < self.thresholds.min_gas_efficiency,
            &|| {
                Alert::new(
                    Severity::Info,
                    format!(
                        "gas efficiency {:.1}% below floor {:.1}%",
                        metrics.gas_efficiency, self.thresholds.min_gas_efficiency
                    ),
                    serde_json::json!({
                        "gas_efficiency": metrics.gas_efficiency,
                        "min_gas_efficiency": self.thresholds.min_gas_efficiency,
                    }),
                    network,
                )
            },
        );

        alerts
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use deedstream_core::events::Provenance;

    fn healthy_metrics() -> PlatformMetrics {
        PlatformMetrics {
            network: None,
            success_rate: 100.0,
            avg_confirmation_ms: 1_000.0,
            total_gas_used: 0,
            gas_by_network: Default::default(),
            gas_efficiency: 100.0,
            active_investors: 0,
            deployments: 0,
            transfers: 0,
            bridge_transfers: 0,
            identity_verifications: 0,
            agent_operations: 0,
            total_operations: 0,
        }
    }

    fn violation(index: u32) -> ComplianceViolation {
        ComplianceViolation {
            provenance: Provenance {
                network: "sepolia".into(),
                block_number: 100 + index as u64,
                tx_hash: format!("0xv{index}"),
                log_index: 0,
                timestamp: 1_700_000_000,
            },
            token: "0x1".into(),
            from: "0x2".into(),
            to: "0x3".into(),
            amount: "100".into(),
            reason: "country restricted".into(),
        }
    }

    fn thresholds_with_max_violations(max: u64) -> AlertThresholds {
        AlertThresholds {
            max_compliance_violations: max,
            ..Default::default()
        }
    }

    #[test]
    fn violation_threshold_crossing() {
        let evaluator = AlertEvaluator::new(thresholds_with_max_violations(5));
        let metrics = healthy_metrics();

        // At 4 recorded violations: no critical alert.
        let four: Vec<ComplianceViolation> = (0..4).map(violation).collect();
        assert!(evaluator.evaluate(Some("sepolia"), &metrics, &four, 0).is_empty());

        // At 5: a critical alert referencing exactly the last 5.
        let five: Vec<ComplianceViolation> = (0..5).map(violation).collect();
        let alerts = evaluator.evaluate(Some("sepolia"), &metrics, &five, 0);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, Severity::Critical);
        let referenced = alerts[0].details["violations"].as_array().unwrap();
        assert_eq!(referenced.len(), 5);
        assert_eq!(referenced[4]["tx_hash"], "0xv4");
    }

    #[test]
    fn edge_trigger_does_not_refire_while_held() {
        let evaluator = AlertEvaluator::new(thresholds_with_max_violations(5));
        let metrics = healthy_metrics();
        let six: Vec<ComplianceViolation> = (0..6).map(violation).collect();

        assert_eq!(evaluator.evaluate(Some("sepolia"), &metrics, &six, 0).len(), 1);
        // Condition still holds — no second alert.
        assert!(evaluator.evaluate(Some("sepolia"), &metrics, &six, 0).is_empty());
    }

    #[test]
    fn condition_rearms_after_clearing() {
        let evaluator = AlertEvaluator::new(AlertThresholds::default());
        let mut degraded = healthy_metrics();
        degraded.success_rate = 50.0;

        let first = evaluator.evaluate(Some("sepolia"), &degraded, &[], 0);
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].severity, Severity::Critical);

        // Recovery clears the condition.
        assert!(evaluator.evaluate(Some("sepolia"), &healthy_metrics(), &[], 0).is_empty());

        // A new breach fires again.
        assert_eq!(evaluator.evaluate(Some("sepolia"), &degraded, &[], 0).len(), 1);
    }

    #[test]
    fn independent_scopes_track_separately() {
        let evaluator = AlertEvaluator::new(AlertThresholds::default());
        let mut degraded = healthy_metrics();
        degraded.success_rate = 50.0;

        assert_eq!(evaluator.evaluate(Some("sepolia"), &degraded, &[], 0).len(), 1);
        // Same breach on another network still fires.
        assert_eq!(evaluator.evaluate(Some("polygon"), &degraded, &[], 0).len(), 1);
    }

    #[test]
    fn reorg_and_gas_conditions() {
        let evaluator = AlertEvaluator::new(AlertThresholds::default());
        let mut metrics = healthy_metrics();
        metrics.gas_efficiency = 50.0;

        let alerts = evaluator.evaluate(Some("sepolia"), &metrics, &[], 4);
        assert_eq!(alerts.len(), 2);
        assert!(alerts.iter().any(|a| a.severity == Severity::Warning)); // reorgs (default max 3)
        assert!(alerts.iter().any(|a| a.severity == Severity::Info)); // gas efficiency
    }

    #[test]
    fn confirmation_time_warning() {
        let evaluator = AlertEvaluator::new(AlertThresholds::default());
        let mut metrics = healthy_metrics();
        metrics.avg_confirmation_ms = 120_000.0;

        let alerts = evaluator.evaluate(None, &metrics, &[], 0);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, Severity::Warning);
        assert!(alerts[0].network.is_none());
    }
}
