//! Sync message subscriber
//!
//! Listens on the shared channel and applies peer announcements to the
//! local account cache. Messages that originated on this node are skipped,
//! and updates only land on accounts with an active local session. The
//! subscriber reconnects with a fixed delay when the broker drops it.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use economy_core::AccountCache;

use crate::config::SyncConfig;
use crate::error::{Error, Result};
use crate::message::{SyncKind, SyncMessage};
use crate::metrics::{SYNC_CONNECTION_STATUS, SYNC_RECEIVE_TOTAL};
use crate::publisher::kind_label;

/// Channel listener that mirrors peer commits into the local cache
pub struct SyncSubscriber {
    client: redis::Client,
    cfg: SyncConfig,
    cache: Arc<AccountCache>,
}

impl SyncSubscriber {
    /// Build a subscriber; no connection is made until [`spawn`](Self::spawn)
    pub fn new(cfg: SyncConfig, cache: Arc<AccountCache>) -> Result<Self> {
        let client = redis::Client::open(cfg.url.as_str())?;
        Ok(Self { client, cfg, cache })
    }

    /// Run the listen loop on a background task
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let delay = Duration::from_millis(self.cfg.reconnect_delay_ms);
            loop {
                match self.listen().await {
                    Ok(()) => {
                        warn!(channel = %self.cfg.channel, "sync stream ended, reconnecting");
                    }
                    Err(e) => {
                        warn!(channel = %self.cfg.channel, "sync subscriber error: {}, reconnecting", e);
                    }
                }
                SYNC_CONNECTION_STATUS.with_label_values(&["disconnected"]).inc();
                tokio::time::sleep(delay).await;
            }
        })
    }

    async fn listen(&self) -> Result<()> {
        let conn = self.client.get_async_connection().await?;
        let mut pubsub = conn.into_pubsub();
        pubsub
            .subscribe(&self.cfg.channel)
            .await
            .map_err(|e| Error::Subscribe(e.to_string()))?;

        SYNC_CONNECTION_STATUS.with_label_values(&["connected"]).inc();
        info!(channel = %self.cfg.channel, node = %self.cfg.node_id, "sync subscriber listening");

        let mut stream = pubsub.on_message();
        while let Some(msg) = stream.next().await {
            let payload = msg.get_payload_bytes();
            match SyncMessage::from_bytes(payload) {
                Ok(message) => apply_message(&self.cache, &self.cfg.node_id, &message),
                Err(e) => {
                    warn!("sync message parse failed: {}", e);
                    SYNC_RECEIVE_TOTAL
                        .with_label_values(&["unknown", "parse_error"])
                        .inc();
                }
            }
        }

        Ok(())
    }
}

/// Apply one peer announcement to the local cache
///
/// Echoes of this node's own publishes are dropped so an announcement
/// never overwrites the balance it was derived from. The cache itself
/// ignores identities without an active session here.
pub fn apply_message(cache: &AccountCache, node_id: &str, message: &SyncMessage) {
    let kind = kind_label(message.kind);

    if message.origin == node_id {
        SYNC_RECEIVE_TOTAL.with_label_values(&[kind, "skipped"]).inc();
        return;
    }

    match message.kind {
        SyncKind::BalanceUpdate => match message.balance {
            Some(balance) => {
                cache.apply_remote_balance(message.identity, balance);
                debug!(identity = %message.identity, origin = %message.origin, %balance, "remote balance received");
                SYNC_RECEIVE_TOTAL.with_label_values(&[kind, "success"]).inc();
            }
            None => {
                warn!(identity = %message.identity, "balance update without a balance");
                SYNC_RECEIVE_TOTAL.with_label_values(&[kind, "invalid"]).inc();
            }
        },
        SyncKind::DailyIncomeReset => {
            cache.apply_remote_income_reset(message.identity);
            SYNC_RECEIVE_TOTAL.with_label_values(&[kind, "success"]).inc();
        }
    }
}
