//! Sync message publisher
//!
//! Implements the core's [`BalanceSync`] seam over Redis pub/sub. Publishing
//! happens on a spawned task so the committing caller never waits on the
//! broker; a failed publish is counted, logged, and dropped. Peers that
//! missed it converge through the shared store.

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};
use uuid::Uuid;

use economy_core::sync::BalanceSync;

use crate::config::SyncConfig;
use crate::error::Result;
use crate::message::{SyncKind, SyncMessage};
use crate::metrics::{SYNC_CONNECTION_STATUS, SYNC_PUBLISH_TOTAL};

/// Fire-and-forget publisher on the shared channel
pub struct SyncPublisher {
    conn: ConnectionManager,
    channel: String,
    node_id: String,
}

impl SyncPublisher {
    /// Connect to the broker
    pub async fn connect(cfg: &SyncConfig) -> Result<Self> {
        let client = redis::Client::open(cfg.url.as_str())?;
        let conn = ConnectionManager::new(client).await?;
        SYNC_CONNECTION_STATUS.with_label_values(&["connected"]).inc();
        info!(url = %cfg.url, channel = %cfg.channel, node = %cfg.node_id, "sync publisher connected");
        Ok(Self {
            conn,
            channel: cfg.channel.clone(),
            node_id: cfg.node_id.clone(),
        })
    }

    /// This node's identity on the channel
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    fn publish(&self, message: SyncMessage) {
        let kind = kind_label(message.kind);
        let payload = match message.to_bytes() {
            Ok(payload) => payload,
            Err(e) => {
                warn!("sync message encode failed: {}", e);
                SYNC_PUBLISH_TOTAL.with_label_values(&[kind, "encode_error"]).inc();
                return;
            }
        };

        let mut conn = self.conn.clone();
        let channel = self.channel.clone();
        tokio::spawn(async move {
            match conn.publish::<_, _, ()>(&channel, payload).await {
                Ok(()) => {
                    SYNC_PUBLISH_TOTAL.with_label_values(&[kind, "success"]).inc();
                    debug!(identity = %message.identity, kind, "sync message published");
                }
                Err(e) => {
                    SYNC_PUBLISH_TOTAL.with_label_values(&[kind, "error"]).inc();
                    warn!(identity = %message.identity, "sync publish failed: {}", e);
                }
            }
        });
    }
}

impl BalanceSync for SyncPublisher {
    fn publish_balance(&self, identity: Uuid, name: &str, balance: Decimal) {
        self.publish(SyncMessage::balance_update(&self.node_id, identity, name, balance));
    }

    fn publish_income_reset(&self, identity: Uuid) {
        self.publish(SyncMessage::income_reset(&self.node_id, identity));
    }
}

pub(crate) fn kind_label(kind: SyncKind) -> &'static str {
    match kind {
        SyncKind::BalanceUpdate => "balance_update",
        SyncKind::DailyIncomeReset => "daily_income_reset",
    }
}
