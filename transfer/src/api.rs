//! Inbound API facade
//!
//! One struct bundling the mutation engine, transfer protocol, leaderboard,
//! stats, and tips. Embedding collaborators (command layers, script bridges,
//! service adapters) hold this facade and nothing deeper.

use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

use economy_core::engine::{OpResult, OpError};
use economy_core::leaderboard::{LeaderboardCache, RankKind};
use economy_core::stats::{GlobalStats, StatsSnapshot};
use economy_core::types::{AccountSnapshot, ChangeReason, OfflineTip, Operator};
use economy_core::{Account, EconomyEngine, Result};

use crate::protocol::{TransferOutcome, TransferProtocol};
use crate::tips::TipService;

/// The economy's inbound surface
pub struct EconomyApi {
    engine: Arc<EconomyEngine>,
    protocol: Arc<TransferProtocol>,
    leaderboard: Arc<LeaderboardCache>,
    stats: Arc<GlobalStats>,
    tips: Arc<TipService>,
}

impl EconomyApi {
    /// Bundle the collaborating parts
    pub fn new(
        engine: Arc<EconomyEngine>,
        protocol: Arc<TransferProtocol>,
        leaderboard: Arc<LeaderboardCache>,
        stats: Arc<GlobalStats>,
        tips: Arc<TipService>,
    ) -> Self {
        Self {
            engine,
            protocol,
            leaderboard,
            stats,
            tips,
        }
    }

    /// The mutation engine, for interceptor registration and direct access
    pub fn engine(&self) -> &Arc<EconomyEngine> {
        &self.engine
    }

    // ---- session lifecycle ----

    /// Session connect: load the account, reconcile the name, return pending
    /// tips (already acknowledged)
    pub async fn connect(&self, id: Uuid, name: &str) -> Result<(Arc<Account>, Vec<OfflineTip>)> {
        let account = self.engine.cache().activate(id, name).await?;
        let tips = self
            .tips
            .collect(id)
            .await
            .map_err(|e| economy_core::Error::Other(e.to_string()))?;
        Ok((account, tips))
    }

    /// Session disconnect: flush and evict
    pub async fn disconnect(&self, id: Uuid) -> Result<()> {
        self.engine.cache().evict(id).await
    }

    // ---- balances ----

    /// Current balance
    pub async fn balance(&self, id: Uuid) -> Result<Decimal> {
        self.engine.balance(id).await
    }

    /// Can the account cover `amount`?
    pub async fn has(&self, id: Uuid, amount: Decimal) -> Result<bool> {
        self.engine.has(id, amount).await
    }

    /// Income accumulated since the last day boundary
    pub async fn daily_income(&self, id: Uuid) -> Result<Decimal> {
        self.engine.daily_income(id).await
    }

    /// Admin deposit
    pub async fn deposit(&self, id: Uuid, amount: Decimal, operator: Option<Operator>) -> OpResult {
        self.engine.deposit(id, amount, ChangeReason::Admin, operator).await
    }

    /// Admin withdraw
    pub async fn withdraw(&self, id: Uuid, amount: Decimal, operator: Option<Operator>) -> OpResult {
        self.engine.withdraw(id, amount, ChangeReason::Admin, operator).await
    }

    /// Admin set
    pub async fn set(&self, id: Uuid, amount: Decimal, operator: Option<Operator>) -> OpResult {
        self.engine.set(id, amount, ChangeReason::Admin, operator).await
    }

    /// Transfer between identities
    pub async fn transfer(
        &self,
        sender: Uuid,
        receiver: Uuid,
        amount: Decimal,
    ) -> std::result::Result<TransferOutcome, OpError> {
        self.protocol.transfer(sender, receiver, amount).await
    }

    // ---- rankings and totals ----

    /// One page of the balance ranking, 1-based
    pub async fn top_balances(&self, page: usize) -> Vec<AccountSnapshot> {
        self.leaderboard.page(RankKind::Balance, page).await
    }

    /// One page of the daily-income ranking, 1-based
    pub async fn top_incomes(&self, page: usize) -> Vec<AccountSnapshot> {
        self.leaderboard.page(RankKind::Income, page).await
    }

    /// 1-based balance rank of an identity, if listed
    pub async fn balance_rank(&self, id: Uuid) -> Option<usize> {
        self.leaderboard.rank(RankKind::Balance, id).await
    }

    /// Aggregate totals
    pub async fn stats(&self) -> Result<StatsSnapshot> {
        self.stats.snapshot().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TransferConfig;
    use economy_core::config::{
        CacheConfig, CurrencyConfig, LeaderboardConfig, LoggingConfig, StatsConfig, StoreConfig,
    };
    use economy_core::hook::InterceptorRegistry;
    use economy_core::metrics::Metrics;
    use economy_core::store::AccountStore;
    use economy_core::writer::spawn_writer;
    use economy_core::{AccountCache, MoneyContext};
    use std::time::Duration;
    use tempfile::TempDir;

    fn dec(v: i64) -> Decimal {
        Decimal::from(v)
    }

    async fn build_api(dir: &TempDir) -> EconomyApi {
        let store_cfg = StoreConfig {
            path: dir.path().join("economy.db"),
            ..StoreConfig::default()
        };
        let store = Arc::new(AccountStore::open(&store_cfg).await.unwrap());
        let metrics = Arc::new(Metrics::new().unwrap());
        let writer = spawn_writer(store.clone(), Duration::from_secs(30), metrics.clone());
        let money = Arc::new(MoneyContext::new(&CurrencyConfig::default()));
        let cache = Arc::new(AccountCache::new(
            store.clone(),
            writer,
            money,
            CacheConfig::default(),
            Decimal::ZERO,
            metrics.clone(),
        ));
        let engine = Arc::new(EconomyEngine::new(
            cache,
            Arc::new(InterceptorRegistry::new()),
            LoggingConfig::default(),
            metrics,
        ));
        let protocol = Arc::new(TransferProtocol::new(engine.clone(), TransferConfig::default()));
        let leaderboard = Arc::new(LeaderboardCache::new(
            store.clone(),
            LeaderboardConfig::default(),
        ));
        let stats = Arc::new(GlobalStats::new(store.clone(), &StatsConfig::default()));
        let tips = Arc::new(TipService::new(store));
        EconomyApi::new(engine, protocol, leaderboard, stats, tips)
    }

    #[tokio::test]
    async fn test_session_and_mutation_flow() {
        let dir = TempDir::new().unwrap();
        let api = build_api(&dir).await;
        let id = Uuid::new_v4();

        let (account, tips) = api.connect(id, "Steve").await.unwrap();
        assert_eq!(account.name(), "Steve");
        assert!(tips.is_empty());

        api.deposit(id, dec(100), None).await.unwrap();
        assert_eq!(api.balance(id).await.unwrap(), dec(100));
        assert!(api.has(id, dec(100)).await.unwrap());
        assert_eq!(api.daily_income(id).await.unwrap(), dec(100));

        api.disconnect(id).await.unwrap();
        // State survives eviction
        assert_eq!(api.balance(id).await.unwrap(), dec(100));
    }

    #[tokio::test]
    async fn test_transfer_then_tips_on_reconnect() {
        let dir = TempDir::new().unwrap();
        let api = build_api(&dir).await;
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        api.connect(a, "A").await.unwrap();
        api.deposit(a, dec(200), None).await.unwrap();

        let outcome = api.transfer(a, b, dec(100)).await.unwrap();
        assert_eq!(outcome.sender_balance, dec(95));
        api.engine().cache().writer().flush().await.unwrap();

        let (_, tips) = api.connect(b, "B").await.unwrap();
        assert_eq!(tips.len(), 1);
        assert_eq!(tips[0].amount, dec(100));

        // Acknowledged on first connect
        let (_, tips) = api.connect(b, "B").await.unwrap();
        assert!(tips.is_empty());
    }

    #[tokio::test]
    async fn test_rankings_and_stats() {
        let dir = TempDir::new().unwrap();
        let api = build_api(&dir).await;
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        api.connect(a, "A").await.unwrap();
        api.connect(b, "B").await.unwrap();
        api.set(a, dec(100), None).await.unwrap();
        api.set(b, dec(300), None).await.unwrap();
        api.engine().cache().flush_all().await.unwrap();

        let top = api.top_balances(1).await;
        assert_eq!(top[0].name, "B");
        assert_eq!(api.balance_rank(b).await, Some(1));

        let stats = api.stats().await.unwrap();
        assert_eq!(stats.total_balance, dec(400));
        assert_eq!(stats.account_count, 2);
    }
}
