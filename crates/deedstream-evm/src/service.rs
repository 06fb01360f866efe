//! The multi-network indexer service — one watcher task per configured
//! network, no synchronization between them.
//!
//! A network whose configuration fails validation is skipped with an error
//! log; the remaining networks start normally. Failures at runtime stay
//! scoped to the network that produced them.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{error, info};

use deedstream_core::config::IndexerConfig;
use deedstream_core::store::IndexStore;
use deedstream_core::types::PipelineEvent;

use crate::rpc::RpcClient;
use crate::watcher::{NetworkWatcher, WatcherHandle};

/// Spawns and supervises the per-network watchers.
pub struct IndexerService<C: RpcClient> {
    config: IndexerConfig,
    rpc: Arc<C>,
    store: Arc<dyn IndexStore>,
    events: broadcast::Sender<PipelineEvent>,
}

impl<C: RpcClient + 'static> IndexerService<C> {
    pub fn new(config: IndexerConfig, rpc: Arc<C>, store: Arc<dyn IndexStore>) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            config,
            rpc,
            store,
            events,
        }
    }

    /// Subscribe to pipeline progress events. Call before `start()` to
    /// avoid missing the first blocks.
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.events.subscribe()
    }

    /// Start one watcher per valid network config and return the handles.
    pub fn start(&self) -> Vec<WatcherHandle> {
        let mut handles = Vec::new();
        for cfg in &self.config.networks {
            if let Err(error) = cfg.validate() {
                // Fatal for this network only.
                error!(network = %cfg.name, %error, "skipping misconfigured network");
                continue;
            }
            info!(network = %cfg.name, mode = ?cfg.mode, "starting watcher");
            handles.push(NetworkWatcher::spawn(
                cfg.clone(),
                Arc::clone(&self.rpc),
                Arc::clone(&self.store),
                self.events.clone(),
            ));
        }
        handles
    }

    /// Stop every watcher and wait for each to wind down.
    pub async fn stop(handles: Vec<WatcherHandle>) {
        for handle in handles {
            handle.stop().await;
        }
    }
}
