//! deedstream-monitor — metrics aggregation, operation tracking, alert
//! evaluation, and notification delivery.
//!
//! The [`Monitor`] facade wires the pieces together: tracked operations are
//! persisted and trigger a synchronous (push) evaluation; a periodic timer
//! re-evaluates elapsed-time-dependent metrics; pipeline events from the
//! watchers (reorgs, violations) trigger scoped evaluations.

pub mod alerts;
pub mod logging;
pub mod metrics;
pub mod sink;
pub mod tracker;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::warn;

use deedstream_core::config::{AlertThresholds, RetentionConfig};
use deedstream_core::error::StoreError;
use deedstream_core::ops::OperationRecord;
use deedstream_core::store::{EventQuery, IndexStore};
use deedstream_core::types::PipelineEvent;

pub use alerts::{Alert, AlertEvaluator, Severity};
pub use logging::{init_tracing, LogConfig};
pub use metrics::{MetricsAggregator, PlatformMetrics, ServiceMetrics};
pub use sink::{AlertRouter, LogSink, NotificationSink, SinkError, WebhookSink};
pub use tracker::EventTracker;

/// Ties together the aggregator, evaluator, tracker, and sinks.
pub struct Monitor {
    store: Arc<dyn IndexStore>,
    aggregator: MetricsAggregator,
    evaluator: AlertEvaluator,
    router: AlertRouter,
    tracker: EventTracker,
}

impl Monitor {
    pub fn new(
        store: Arc<dyn IndexStore>,
        thresholds: AlertThresholds,
        retention: &RetentionConfig,
    ) -> Self {
        Self {
            aggregator: MetricsAggregator::new(Arc::clone(&store)),
            evaluator: AlertEvaluator::new(thresholds),
            router: AlertRouter::new(),
            tracker: EventTracker::new(Arc::clone(&store), retention.cache_capacity),
            store,
        }
    }

    /// Register an alert delivery target.
    pub fn add_sink(&mut self, sink: Arc<dyn NotificationSink>) {
        self.router.add(sink);
    }

    /// Record a platform operation and evaluate alerts synchronously for
    /// its network (push mode). Alert delivery itself is fire-and-forget —
    /// a sink failure never blocks this path.
    pub async fn track(&self, op: &OperationRecord) -> Result<Vec<Alert>, StoreError> {
        self.tracker.track(op).await?;
        self.evaluate(Some(&op.network)).await
    }

    /// Recompute metrics for a scope and run the alert evaluator. Returns
    /// the alerts that fired (already dispatched to the sinks).
    pub async fn evaluate(&self, network: Option<&str>) -> Result<Vec<Alert>, StoreError> {
        let metrics = self.aggregator.compute(network).await?;
        let query = EventQuery {
            network: network.map(String::from),
            ..Default::default()
        };
        let violations = self.store.violations(&query).await?;
        let reorg_count = self.store.reorg_count(network).await?;
        let alerts = self
            .evaluator
            .evaluate(network, &metrics, &violations, reorg_count);
        self.router.dispatch(&alerts);
        Ok(alerts)
    }

    /// Current metrics snapshot for dashboards.
    pub async fn metrics(&self, network: Option<&str>) -> Result<PlatformMetrics, StoreError> {
        self.aggregator.compute(network).await
    }

    /// Recent tracked operations from the bounded cache, newest first.
    pub fn recent_operations(&self, limit: usize) -> Vec<OperationRecord> {
        self.tracker.recent(limit)
    }

    /// Periodic re-evaluation for metrics that depend purely on elapsed
    /// time. Runs until the returned handle is aborted.
    pub fn spawn_periodic(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let monitor = self;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if let Err(error) = monitor.evaluate(None).await {
                    warn!(%error, "periodic alert evaluation failed");
                }
            }
        })
    }

    /// Follow the watchers' pipeline events and evaluate on reorgs and
    /// newly ingested violations. Ends when every watcher has stopped and
    /// the channel closes.
    pub fn watch_pipeline(
        self: Arc<Self>,
        mut events: broadcast::Receiver<PipelineEvent>,
    ) -> JoinHandle<()> {
        let monitor = self;
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(PipelineEvent::ReorgDetected { network, .. }) => {
                        if let Err(error) = monitor.evaluate(Some(&network)).await {
                            warn!(network, %error, "reorg-triggered evaluation failed");
                        }
                    }
                    Ok(PipelineEvent::BlockIngested {
                        network,
                        violations,
                        ..
                    }) if violations > 0 => {
                        if let Err(error) = monitor.evaluate(Some(&network)).await {
                            warn!(network, %error, "violation-triggered evaluation failed");
                        }
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "pipeline event stream lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}
