//! The RPC client seam — the narrow interface the engine consumes.
//!
//! The core depends only on this trait, not on any specific provider or
//! client library. Implementations wrap `eth_subscribe`, `eth_getLogs`,
//! and `eth_getBlockByNumber` for their transport of choice.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use deedstream_core::error::RpcError;
use deedstream_core::types::{BlockHeader, LogEvent};

/// A stream of block headers from a subscription.
pub type HeaderStream = Pin<Box<dyn Stream<Item = Result<BlockHeader, RpcError>> + Send>>;

/// Narrow RPC interface consumed by the network watcher.
#[async_trait]
pub trait RpcClient: Send + Sync {
    /// Subscribe to new block headers for a network.
    async fn subscribe_blocks(&self, network: &str) -> Result<HeaderStream, RpcError>;

    /// Fetch all logs in `[from_block, to_block]` for a network.
    async fn get_logs(
        &self,
        network: &str,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<RawLog>, RpcError>;

    /// Fetch a block header by number, or the latest when `number` is
    /// `None` (poll-mode head discovery). `Ok(None)` means the block does
    /// not exist yet.
    async fn get_block(
        &self,
        network: &str,
        number: Option<u64>,
    ) -> Result<Option<BlockHeader>, RpcError>;
}

/// A raw EVM log as returned by `eth_getLogs` — hex-string quantities as
/// they appear on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawLog {
    pub address: String,
    pub topics: Vec<String>,
    pub data: String,
    #[serde(rename = "blockNumber")]
    pub block_number: String,
    #[serde(rename = "blockHash")]
    pub block_hash: String,
    #[serde(rename = "transactionHash")]
    pub tx_hash: String,
    #[serde(rename = "transactionIndex")]
    pub tx_index: String,
    #[serde(rename = "logIndex")]
    pub log_index: String,
    pub removed: Option<bool>,
}

impl RawLog {
    /// Normalize into the persisted event shape. A field that fails to
    /// parse is a malformed response — the fetch that produced it failed
    /// and is retried, never treated as an empty result.
    pub fn to_log_event(&self, network: &str, timestamp: i64) -> Result<LogEvent, RpcError> {
        let block_number = parse_hex_u64(&self.block_number)
            .ok_or_else(|| malformed("blockNumber", &self.block_number))?;
        let tx_index =
            parse_hex_u64(&self.tx_index).ok_or_else(|| malformed("transactionIndex", &self.tx_index))?;
        let log_index =
            parse_hex_u64(&self.log_index).ok_or_else(|| malformed("logIndex", &self.log_index))?;
        Ok(LogEvent {
            network: network.to_string(),
            address: self.address.clone(),
            topics: self.topics.clone(),
            data: self.data.clone(),
            block_number,
            tx_hash: self.tx_hash.clone(),
            tx_index: tx_index as u32,
            block_hash: self.block_hash.clone(),
            log_index: log_index as u32,
            timestamp,
            removed: self.removed.unwrap_or(false),
        })
    }
}

fn malformed(field: &str, value: &str) -> RpcError {
    RpcError::Malformed(format!("log field {field} = `{value}`"))
}

/// Parse a hex-encoded quantity (with or without `0x`) to u64.
pub fn parse_hex_u64(s: &str) -> Option<u64> {
    let raw = s.strip_prefix("0x").unwrap_or(s);
    if raw.is_empty() {
        return None;
    }
    u64::from_str_radix(raw, 16).ok()
}

/// Convert a JSON `eth_getBlockByNumber` response into a header.
/// Client implementations use this for the wire format; `None` means the
/// response is missing a required field.
pub fn header_from_json(v: &Value) -> Option<BlockHeader> {
    Some(BlockHeader {
        number: parse_hex_u64(v["number"].as_str()?)?,
        hash: v["hash"].as_str()?.to_string(),
        parent_hash: v["parentHash"].as_str()?.to_string(),
        timestamp: parse_hex_u64(v["timestamp"].as_str()?)? as i64,
    })
}
