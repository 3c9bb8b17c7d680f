//! Global economy statistics
//!
//! Aggregate totals over every stored account, cached with a staleness
//! interval and refreshed lazily on read. Hot paths can nudge the cached
//! totals directly instead of forcing a refresh.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::config::StatsConfig;
use crate::error::Result;
use crate::store::AccountStore;

/// One aggregate reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatsSnapshot {
    /// Sum of every balance
    pub total_balance: Decimal,
    /// Sum of every daily-income accumulator
    pub total_daily_income: Decimal,
    /// Number of accounts
    pub account_count: i64,
    /// When this reading was taken
    pub refreshed_at: DateTime<Utc>,
}

struct Inner {
    snapshot: StatsSnapshot,
    fresh: bool,
}

/// Lazily refreshed aggregate totals
pub struct GlobalStats {
    store: Arc<AccountStore>,
    staleness: Duration,
    inner: RwLock<Inner>,
}

impl GlobalStats {
    /// Build over the store
    pub fn new(store: Arc<AccountStore>, cfg: &StatsConfig) -> Self {
        Self {
            store,
            staleness: Duration::from_secs(cfg.refresh_seconds.max(1)),
            inner: RwLock::new(Inner {
                snapshot: StatsSnapshot {
                    total_balance: Decimal::ZERO,
                    total_daily_income: Decimal::ZERO,
                    account_count: 0,
                    refreshed_at: DateTime::<Utc>::MIN_UTC,
                },
                fresh: false,
            }),
        }
    }

    /// Current totals, refreshed from the store if stale
    pub async fn snapshot(&self) -> Result<StatsSnapshot> {
        {
            let inner = self.inner.read();
            let age = Utc::now().signed_duration_since(inner.snapshot.refreshed_at);
            if inner.fresh && age.to_std().map(|d| d < self.staleness).unwrap_or(false) {
                return Ok(inner.snapshot);
            }
        }
        self.refresh().await
    }

    /// Recompute the totals from the store
    pub async fn refresh(&self) -> Result<StatsSnapshot> {
        let total_balance = self.store.total_balance().await?;
        let total_daily_income = self.store.total_daily_income().await?;
        let account_count = self.store.count_accounts().await?;

        let snapshot = StatsSnapshot {
            total_balance,
            total_daily_income,
            account_count,
            refreshed_at: Utc::now(),
        };
        let mut inner = self.inner.write();
        inner.snapshot = snapshot;
        inner.fresh = true;
        debug!(%total_balance, account_count, "global stats refreshed");
        Ok(snapshot)
    }

    /// Nudge the cached balance total without a refresh
    pub fn add_to_total_balance(&self, delta: Decimal) {
        let mut inner = self.inner.write();
        inner.snapshot.total_balance += delta;
    }

    /// Nudge the cached income total without a refresh
    pub fn add_to_total_income(&self, delta: Decimal) {
        let mut inner = self.inner.write();
        inner.snapshot.total_daily_income += delta;
    }
}
