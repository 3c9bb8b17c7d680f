//! Write-back account cache
//!
//! Hot accounts live in a concurrent identity map with a display-name side
//! index. Identity lookups auto-provision missing accounts with the configured
//! starting balance; name lookups never provision. Mutated accounts are
//! persisted by the write-back actor, and eviction flushes first.

use chrono::{FixedOffset, Utc};
use dashmap::{DashMap, DashSet};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::CacheConfig;
use crate::error::{Error, Result};
use crate::metrics::Metrics;
use crate::money::MoneyContext;
use crate::store::AccountStore;
use crate::sync::{BalanceSync, NullSync};
use crate::types::{now_millis, Account, AccountSnapshot};
use crate::writer::WriterHandle;

/// Account cache over the store and write-back actor
pub struct AccountCache {
    store: Arc<AccountStore>,
    writer: WriterHandle,
    money: Arc<MoneyContext>,
    cfg: CacheConfig,
    starting_balance: Decimal,
    load_timeout: Duration,
    accounts: DashMap<Uuid, Arc<Account>>,
    name_index: DashMap<String, Uuid>,
    active: DashSet<Uuid>,
    sync: RwLock<Arc<dyn BalanceSync>>,
    metrics: Arc<Metrics>,
}

impl AccountCache {
    /// Build a cache over the given store and writer
    pub fn new(
        store: Arc<AccountStore>,
        writer: WriterHandle,
        money: Arc<MoneyContext>,
        cfg: CacheConfig,
        starting_balance: Decimal,
        metrics: Arc<Metrics>,
    ) -> Self {
        let load_timeout = Duration::from_millis(cfg.load_timeout_ms);
        Self {
            store,
            writer,
            money,
            cfg,
            starting_balance,
            load_timeout,
            accounts: DashMap::new(),
            name_index: DashMap::new(),
            active: DashSet::new(),
            sync: RwLock::new(Arc::new(NullSync)),
            metrics,
        }
    }

    /// Attach the replication channel
    pub fn set_sync(&self, sync: Arc<dyn BalanceSync>) {
        *self.sync.write() = sync;
    }

    /// The underlying store
    pub fn store(&self) -> &Arc<AccountStore> {
        &self.store
    }

    /// The write-back handle
    pub fn writer(&self) -> &WriterHandle {
        &self.writer
    }

    fn index_key(&self, name: &str) -> String {
        if self.cfg.name_index_ignore_case {
            name.to_lowercase()
        } else {
            name.to_string()
        }
    }

    /// Fetch an account by identity, provisioning it if missing
    ///
    /// A provisioned account gets the configured starting balance and a
    /// placeholder name derived from the identity until a session supplies
    /// the real one.
    pub async fn get(&self, id: Uuid) -> Result<Arc<Account>> {
        let placeholder = id.to_string().chars().take(8).collect::<String>();
        self.load(id, placeholder).await
    }

    /// Fetch an account at session connect, with the authoritative name
    ///
    /// Updates the display name if it changed and zeroes the daily-income
    /// accumulator if a day boundary passed since the last reset.
    pub async fn activate(&self, id: Uuid, name: &str) -> Result<Arc<Account>> {
        let account = self.load(id, name.to_string()).await?;
        self.active.insert(id);

        let old_name = account.name();
        if old_name != name {
            self.name_index.remove(&self.index_key(&old_name));
            account.rename(name.to_string());
            self.name_index.insert(self.index_key(name), id);
            self.writer.save_account(account.clone());
            info!(identity = %id, from = %old_name, to = %name, "account renamed");
        }

        self.reset_if_day_passed(&account);
        Ok(account)
    }

    async fn load(&self, id: Uuid, name: String) -> Result<Arc<Account>> {
        if !self.cfg.disable_cache {
            if let Some(existing) = self.accounts.get(&id) {
                self.metrics.record_cache_hit();
                return Ok(existing.clone());
            }
            self.metrics.record_cache_miss();
        }

        let loaded = tokio::time::timeout(self.load_timeout, self.store.get_account(id))
            .await
            .map_err(|_| Error::StoreUnavailable("account load timed out".to_string()))??;

        let account = match loaded {
            Some(snap) => Arc::new(Account::from_snapshot(snap)),
            None => {
                let account = Arc::new(Account::new(
                    id,
                    name,
                    self.money.clamp(self.starting_balance),
                ));
                self.store.insert_account_if_absent(&account.snapshot()).await?;
                self.metrics.record_provision();
                debug!(identity = %id, "account provisioned");
                account
            }
        };

        if self.cfg.disable_cache {
            return Ok(account);
        }

        // Another task may have inserted concurrently; the first one wins.
        let account = self.accounts.entry(id).or_insert_with(|| account).clone();
        self.name_index.insert(self.index_key(&account.name()), id);
        Ok(account)
    }

    /// Fetch an account by display name; never provisions
    pub async fn get_by_name(&self, name: &str) -> Result<Option<Arc<Account>>> {
        if !self.cfg.disable_cache {
            let indexed = self.name_index.get(&self.index_key(name)).map(|e| *e.value());
            if let Some(id) = indexed {
                if let Some(account) = self.accounts.get(&id) {
                    self.metrics.record_cache_hit();
                    return Ok(Some(account.clone()));
                }
            }
            self.metrics.record_cache_miss();
        }

        let loaded = self
            .store
            .get_account_by_name(name, self.cfg.name_index_ignore_case)
            .await?;
        let Some(snap) = loaded else {
            return Ok(None);
        };

        let id = snap.id;
        let account = Arc::new(Account::from_snapshot(snap));
        if self.cfg.disable_cache {
            return Ok(Some(account));
        }
        let account = self.accounts.entry(id).or_insert_with(|| account).clone();
        self.name_index.insert(self.index_key(&account.name()), id);
        Ok(Some(account))
    }

    /// Is this identity currently cached?
    pub fn is_resident(&self, id: Uuid) -> bool {
        self.accounts.contains_key(&id)
    }

    /// Does this identity have an active session?
    ///
    /// Distinct from residency: a transfer caches its receiver, but only
    /// [`activate`](Self::activate) marks a session.
    pub fn is_active(&self, id: Uuid) -> bool {
        self.active.contains(&id)
    }

    /// Every cached account
    pub fn resident_accounts(&self) -> Vec<Arc<Account>> {
        self.accounts.iter().map(|e| e.value().clone()).collect()
    }

    /// Every account with an active session
    pub fn active_accounts(&self) -> Vec<Arc<Account>> {
        self.active
            .iter()
            .filter_map(|id| self.accounts.get(&*id).map(|e| e.value().clone()))
            .collect()
    }

    /// Identities of every known account: stored rows plus residents
    pub async fn all_known_ids(&self) -> Result<Vec<Uuid>> {
        let mut ids: Vec<Uuid> = match self.store.all_accounts().await {
            Ok(rows) => rows.into_iter().map(|s| s.id).collect(),
            Err(e) => {
                // Degrade to the resident set rather than failing the batch
                warn!("account scan failed, falling back to residents: {}", e);
                Vec::new()
            }
        };
        for entry in self.accounts.iter() {
            if !ids.contains(entry.key()) {
                ids.push(*entry.key());
            }
        }
        Ok(ids)
    }

    /// Queue a write-back for a dirty account
    pub fn save(&self, account: &Arc<Account>) {
        if account.is_dirty() {
            self.writer.save_account(account.clone());
        }
    }

    /// Queue every dirty resident and wait for durability
    pub async fn flush_all(&self) -> Result<()> {
        for entry in self.accounts.iter() {
            self.save(entry.value());
        }
        self.writer.flush().await
    }

    /// End the session, flush if dirty, and drop the account from the cache
    pub async fn evict(&self, id: Uuid) -> Result<()> {
        self.active.remove(&id);
        if let Some((_, account)) = self.accounts.remove(&id) {
            self.name_index.remove(&self.index_key(&account.name()));
            if account.is_dirty() {
                self.writer.save_account(account);
                self.writer.flush().await?;
            }
        }
        Ok(())
    }

    /// Zero the daily-income accumulator of every resident account whose last
    /// reset predates the current day boundary
    pub fn check_daily_reset(&self) {
        let boundary = self.day_start_millis();
        for entry in self.accounts.iter() {
            self.reset_one(entry.value(), boundary);
        }
    }

    fn reset_if_day_passed(&self, account: &Arc<Account>) {
        self.reset_one(account, self.day_start_millis());
    }

    fn reset_one(&self, account: &Arc<Account>, boundary: i64) {
        let needs_reset = {
            let st = account.lock();
            st.last_income_reset < boundary
        };
        if needs_reset {
            account.reset_daily_income(now_millis());
            self.writer.save_account(account.clone());
            self.sync.read().publish_income_reset(account.id());
            debug!(identity = %account.id(), "daily income reset");
        }
    }

    /// Start of the current day under the configured UTC offset, epoch millis
    pub fn day_start_millis(&self) -> i64 {
        let secs = self.cfg.utc_offset_hours.clamp(-23, 23) * 3600;
        let offset = FixedOffset::east_opt(secs)
            .unwrap_or_else(|| FixedOffset::east_opt(0).expect("zero UTC offset"));
        let now = Utc::now().with_timezone(&offset);
        now.date_naive()
            .and_hms_opt(0, 0, 0)
            .and_then(|midnight| midnight.and_local_timezone(offset).single())
            .map(|dt| dt.timestamp_millis())
            .unwrap_or_else(|| now.timestamp_millis())
    }

    /// Overwrite an active account's balance from a peer node announcement
    ///
    /// Last writer wins. Identities without an active session are ignored;
    /// they will read fresh state from the shared store on next load.
    pub fn apply_remote_balance(&self, id: Uuid, balance: Decimal) {
        if !self.is_active(id) {
            return;
        }
        if let Some(account) = self.accounts.get(&id) {
            account.set_balance(self.money.clamp(balance));
            debug!(identity = %id, %balance, "remote balance applied");
        }
    }

    /// Zero an active account's daily income from a peer node announcement
    pub fn apply_remote_income_reset(&self, id: Uuid) {
        if !self.is_active(id) {
            return;
        }
        if let Some(account) = self.accounts.get(&id) {
            account.reset_daily_income(now_millis());
        }
    }

    /// Money rules shared with the engine
    pub fn money(&self) -> &Arc<MoneyContext> {
        &self.money
    }

    /// Point-in-time copies of every stored account
    pub async fn all_snapshots(&self) -> Result<Vec<AccountSnapshot>> {
        self.store.all_accounts().await
    }
}
