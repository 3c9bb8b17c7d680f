//! Configuration for the sync bus

use serde::{Deserialize, Serialize};

/// Sync bus configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Enable cross-node replication; when false, [`crate::start`] wires nothing
    pub enabled: bool,

    /// Broker URL
    pub url: String,

    /// Pub/sub channel shared by all nodes
    pub channel: String,

    /// This node's identity; must differ across the cluster
    pub node_id: String,

    /// Delay before a reconnect attempt (milliseconds)
    pub reconnect_delay_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: "redis://127.0.0.1:6379".to_string(),
            channel: "coinrail:sync".to_string(),
            node_id: format!("node-{:04x}", rand::random::<u16>()),
            reconnect_delay_ms: 5_000,
        }
    }
}
