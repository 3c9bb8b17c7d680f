//! Offline transfer tips
//!
//! When a transfer lands on a receiver without an active session, the
//! protocol records a tip. On the receiver's next session connect the
//! embedding collaborator reads the pending tips, tells the player, and marks
//! them notified. Rows are kept for the retention window, not deleted.

use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use economy_core::store::AccountStore;
use economy_core::types::OfflineTip;

use crate::error::Result;

/// Read/acknowledge surface over recorded tips
pub struct TipService {
    store: Arc<AccountStore>,
}

impl TipService {
    /// Build over the store
    pub fn new(store: Arc<AccountStore>) -> Self {
        Self { store }
    }

    /// Number of tips the receiver has not seen yet
    pub async fn unnotified_count(&self, receiver: Uuid) -> Result<i64> {
        Ok(self.store.unnotified_tip_count(receiver).await?)
    }

    /// Tips the receiver has not seen yet, oldest first
    pub async fn pending(&self, receiver: Uuid) -> Result<Vec<OfflineTip>> {
        Ok(self.store.unnotified_tips(receiver).await?)
    }

    /// Mark every pending tip as seen
    pub async fn mark_notified(&self, receiver: Uuid) -> Result<()> {
        self.store.mark_tips_notified(receiver).await?;
        debug!(%receiver, "offline tips acknowledged");
        Ok(())
    }

    /// Fetch pending tips and mark them seen in one step
    pub async fn collect(&self, receiver: Uuid) -> Result<Vec<OfflineTip>> {
        let tips = self.pending(receiver).await?;
        if !tips.is_empty() {
            self.mark_notified(receiver).await?;
        }
        Ok(tips)
    }
}
