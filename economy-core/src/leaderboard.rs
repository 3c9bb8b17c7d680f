//! Ranked leaderboard snapshots
//!
//! Two rankings (balance and daily income) are rebuilt from the store on a
//! timer and swapped in atomically, so readers never see a half-built list.
//! The store is asked for twice the configured size so blacklist filtering
//! does not shorten the final list.

use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::{BlacklistConfig, LeaderboardConfig};
use crate::error::Result;
use crate::store::AccountStore;
use crate::types::AccountSnapshot;

/// Which ranking to read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankKind {
    /// Ranked by balance
    Balance,
    /// Ranked by daily income
    Income,
}

struct Blacklist {
    enabled: bool,
    names: HashSet<String>,
    identities: HashSet<Uuid>,
}

impl Blacklist {
    fn from_config(cfg: &BlacklistConfig) -> Self {
        Self {
            enabled: cfg.enabled,
            names: cfg.names.iter().map(|n| n.to_lowercase()).collect(),
            identities: cfg.identities.iter().copied().collect(),
        }
    }

    fn hides(&self, snap: &AccountSnapshot) -> bool {
        self.enabled
            && (self.identities.contains(&snap.id)
                || self.names.contains(&snap.name.to_lowercase()))
    }
}

#[derive(Default)]
struct Snapshots {
    built: bool,
    by_balance: Vec<AccountSnapshot>,
    by_income: Vec<AccountSnapshot>,
    balance_rank: HashMap<Uuid, usize>,
    income_rank: HashMap<Uuid, usize>,
}

/// Leaderboard snapshot cache
pub struct LeaderboardCache {
    store: Arc<AccountStore>,
    cfg: LeaderboardConfig,
    blacklist: RwLock<Blacklist>,
    snapshots: RwLock<Arc<Snapshots>>,
}

impl LeaderboardCache {
    /// Build a leaderboard over the store
    pub fn new(store: Arc<AccountStore>, cfg: LeaderboardConfig) -> Self {
        let blacklist = Blacklist::from_config(&cfg.blacklist);
        Self {
            store,
            cfg,
            blacklist: RwLock::new(blacklist),
            snapshots: RwLock::new(Arc::new(Snapshots::default())),
        }
    }

    /// Replace the blacklist (configuration reload)
    pub fn reload_blacklist(&self, cfg: &BlacklistConfig) {
        *self.blacklist.write() = Blacklist::from_config(cfg);
    }

    /// Rebuild both rankings from the store and swap them in
    pub async fn rebuild(&self) -> Result<()> {
        let fetch = self.cfg.size * 2;
        let raw_balance = self.store.top_by_balance(fetch).await?;
        let raw_income = self.store.top_by_income(fetch).await?;

        let (by_balance, by_income) = {
            let blacklist = self.blacklist.read();
            let filter = |rows: Vec<AccountSnapshot>| {
                rows.into_iter()
                    .filter(|s| !blacklist.hides(s))
                    .take(self.cfg.size)
                    .collect::<Vec<_>>()
            };
            (filter(raw_balance), filter(raw_income))
        };

        let rank_map = |rows: &[AccountSnapshot]| {
            rows.iter()
                .enumerate()
                .map(|(i, s)| (s.id, i + 1))
                .collect::<HashMap<_, _>>()
        };

        let fresh = Arc::new(Snapshots {
            built: true,
            balance_rank: rank_map(&by_balance),
            income_rank: rank_map(&by_income),
            by_balance,
            by_income,
        });

        debug!(
            balance_entries = fresh.by_balance.len(),
            income_entries = fresh.by_income.len(),
            "leaderboard rebuilt"
        );
        *self.snapshots.write() = fresh;
        Ok(())
    }

    async fn current(&self) -> Arc<Snapshots> {
        let snap = self.snapshots.read().clone();
        if snap.built {
            return snap;
        }
        // First access before the timer fired: build now
        if let Err(e) = self.rebuild().await {
            warn!("leaderboard rebuild failed: {}", e);
        }
        self.snapshots.read().clone()
    }

    /// One page of a ranking, 1-based
    pub async fn page(&self, kind: RankKind, page: usize) -> Vec<AccountSnapshot> {
        let snap = self.current().await;
        let rows = match kind {
            RankKind::Balance => &snap.by_balance,
            RankKind::Income => &snap.by_income,
        };
        let start = page.saturating_sub(1) * self.cfg.per_page;
        rows.iter().skip(start).take(self.cfg.per_page).cloned().collect()
    }

    /// 1-based rank of an identity, if listed
    pub async fn rank(&self, kind: RankKind, id: Uuid) -> Option<usize> {
        let snap = self.current().await;
        match kind {
            RankKind::Balance => snap.balance_rank.get(&id).copied(),
            RankKind::Income => snap.income_rank.get(&id).copied(),
        }
    }

    /// Number of pages in a ranking
    pub async fn total_pages(&self, kind: RankKind) -> usize {
        let snap = self.current().await;
        let len = match kind {
            RankKind::Balance => snap.by_balance.len(),
            RankKind::Income => snap.by_income.len(),
        };
        len.div_ceil(self.cfg.per_page.max(1))
    }

    /// Spawn the periodic rebuild task
    pub fn spawn_refresh(self: &Arc<Self>) -> JoinHandle<()> {
        let this = self.clone();
        let period = Duration::from_secs(this.cfg.refresh_seconds.max(1));
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(period);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tick.tick().await;
                if let Err(e) = this.rebuild().await {
                    warn!("scheduled leaderboard rebuild failed: {}", e);
                }
            }
        })
    }
}
