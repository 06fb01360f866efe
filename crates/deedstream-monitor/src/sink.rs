//! Notification sinks — alert delivery targets.
//!
//! Delivery is fire-and-forget: a sink failure is logged but never
//! propagated back to the event-tracking path that triggered the alert.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use crate::alerts::{Alert, Severity};

#[derive(Debug, Error)]
#[error("sink error: {0}")]
pub struct SinkError(pub String);

/// A delivery target for alerts (log, webhook, e-mail, …).
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, alert: &Alert) -> Result<(), SinkError>;

    fn name(&self) -> &str;
}

/// Writes alerts to the tracing log at a level matching their severity.
#[derive(Default)]
pub struct LogSink;

impl LogSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NotificationSink for LogSink {
    async fn send(&self, alert: &Alert) -> Result<(), SinkError> {
        match alert.severity {
            Severity::Critical => tracing::error!(
                network = alert.network.as_deref().unwrap_or("all"),
                details = %alert.details,
                "ALERT: {}",
                alert.message
            ),
            Severity::Warning => warn!(
                network = alert.network.as_deref().unwrap_or("all"),
                details = %alert.details,
                "ALERT: {}",
                alert.message
            ),
            Severity::Info => info!(
                network = alert.network.as_deref().unwrap_or("all"),
                details = %alert.details,
                "ALERT: {}",
                alert.message
            ),
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}

/// POSTs each alert as JSON to a configured endpoint.
pub struct WebhookSink {
    client: reqwest::Client,
    url: String,
}

impl WebhookSink {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl NotificationSink for WebhookSink {
    async fn send(&self, alert: &Alert) -> Result<(), SinkError> {
        let response = self
            .client
            .post(&self.url)
            .json(alert)
            .send()
            .await
            .map_err(|e| SinkError(e.to_string()))?;
        if !response.status().is_success() {
            return Err(SinkError(format!("webhook returned {}", response.status())));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "webhook"
    }
}

/// Fans alerts out to every registered sink, fire-and-forget.
#[derive(Default)]
pub struct AlertRouter {
    sinks: Vec<Arc<dyn NotificationSink>>,
}

impl AlertRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, sink: Arc<dyn NotificationSink>) {
        self.sinks.push(sink);
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// Dispatch alerts without waiting for delivery. Failures are logged by
    /// the spawned task; nothing propagates to the caller.
    pub fn dispatch(&self, alerts: &[Alert]) {
        for alert in alerts {
            for sink in &self.sinks {
                let sink = Arc::clone(sink);
                let alert = alert.clone();
                tokio::spawn(async move {
                    if let Err(error) = sink.send(&alert).await {
                        warn!(sink = sink.name(), %error, "alert delivery failed");
                    }
                });
            }
        }
    }
}
