//! Balance mutation engine
//!
//! Deposit, withdraw, and set all walk the same path: clamp the requested
//! amount, validate against the pre-hook amount, run the interceptor chain,
//! then commit in memory and queue durability, journaling, and replication.
//! Validation failures are values, not panics and not transport errors.

use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::cache::AccountCache;
use crate::config::LoggingConfig;
use crate::error::Error as CoreError;
use crate::hook::{InterceptorRegistry, MutationContext};
use crate::metrics::Metrics;
use crate::money::MoneyContext;
use crate::sync::{BalanceSync, NullSync};
use crate::types::{now_millis, ActionKind, ChangeReason, EconomyLog, Operator};

/// Why a mutation or transfer was rejected
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum OpError {
    /// Amount was zero, negative, or otherwise malformed
    #[error("invalid amount")]
    InvalidAmount,

    /// The account could not be loaded
    #[error("account not found")]
    AccountNotFound,

    /// The mutation would push the balance past the ceiling
    #[error("balance ceiling exceeded")]
    CeilingExceeded,

    /// The account cannot cover the requested amount
    #[error("insufficient funds")]
    InsufficientFunds,

    /// An interceptor cancelled the mutation
    #[error("cancelled by interceptor")]
    Cancelled,

    /// Sender and receiver are the same identity
    #[error("self transfer not allowed")]
    SelfTransferNotAllowed,

    /// Transfer amount is outside the configured bounds
    #[error("amount outside [{min}, {max}]")]
    AmountOutOfBounds {
        /// Smallest allowed amount
        min: Decimal,
        /// Largest allowed amount
        max: Decimal,
    },

    /// The store could not answer in time
    #[error("store unavailable")]
    StoreUnavailable,
}

impl OpError {
    /// Stable label for metrics
    pub fn status(&self) -> &'static str {
        match self {
            OpError::InvalidAmount => "invalid_amount",
            OpError::AccountNotFound => "account_not_found",
            OpError::CeilingExceeded => "ceiling_exceeded",
            OpError::InsufficientFunds => "insufficient_funds",
            OpError::Cancelled => "cancelled",
            OpError::SelfTransferNotAllowed => "self_transfer",
            OpError::AmountOutOfBounds { .. } => "out_of_bounds",
            OpError::StoreUnavailable => "store_unavailable",
        }
    }
}

/// A committed mutation
#[derive(Debug, Clone, PartialEq)]
pub struct Committed {
    /// The clamped requested amount
    pub amount: Decimal,
    /// The balance after commit
    pub new_balance: Decimal,
}

/// Result of one mutation
pub type OpResult = Result<Committed, OpError>;

/// Which accounts a batch mutation targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchTarget {
    /// Every stored account
    All,
    /// Only accounts with an active session
    Residents,
}

/// Outcome of a best-effort batch mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchOutcome {
    /// Mutations that committed
    pub succeeded: u32,
    /// Mutations rejected or failed
    pub failed: u32,
}

/// The balance mutation engine
pub struct EconomyEngine {
    cache: Arc<AccountCache>,
    money: Arc<MoneyContext>,
    hooks: Arc<InterceptorRegistry>,
    sync: RwLock<Arc<dyn BalanceSync>>,
    metrics: Arc<Metrics>,
    logging: LoggingConfig,
}

impl EconomyEngine {
    /// Build an engine over the cache
    pub fn new(
        cache: Arc<AccountCache>,
        hooks: Arc<InterceptorRegistry>,
        logging: LoggingConfig,
        metrics: Arc<Metrics>,
    ) -> Self {
        let money = cache.money().clone();
        Self {
            cache,
            money,
            hooks,
            sync: RwLock::new(Arc::new(NullSync)),
            metrics,
            logging,
        }
    }

    /// Attach the replication channel
    pub fn set_sync(&self, sync: Arc<dyn BalanceSync>) {
        *self.sync.write() = sync;
    }

    /// The account cache this engine mutates
    pub fn cache(&self) -> &Arc<AccountCache> {
        &self.cache
    }

    /// Money rules
    pub fn money(&self) -> &Arc<MoneyContext> {
        &self.money
    }

    /// Interceptor registry
    pub fn hooks(&self) -> &Arc<InterceptorRegistry> {
        &self.hooks
    }

    // ---- mutations ----

    /// Increase a balance
    pub async fn deposit(
        &self,
        id: Uuid,
        amount: Decimal,
        reason: ChangeReason,
        operator: Option<Operator>,
    ) -> OpResult {
        self.mutate(id, ActionKind::Deposit, amount, reason, operator).await
    }

    /// Decrease a balance
    pub async fn withdraw(
        &self,
        id: Uuid,
        amount: Decimal,
        reason: ChangeReason,
        operator: Option<Operator>,
    ) -> OpResult {
        self.mutate(id, ActionKind::Withdraw, amount, reason, operator).await
    }

    /// Replace a balance outright
    pub async fn set(
        &self,
        id: Uuid,
        amount: Decimal,
        reason: ChangeReason,
        operator: Option<Operator>,
    ) -> OpResult {
        self.mutate(id, ActionKind::Set, amount, reason, operator).await
    }

    async fn mutate(
        &self,
        id: Uuid,
        action: ActionKind,
        amount: Decimal,
        reason: ChangeReason,
        operator: Option<Operator>,
    ) -> OpResult {
        let started = Instant::now();
        let result = self.mutate_inner(id, action, amount, reason, operator).await;
        self.metrics.record_operation_duration(started.elapsed().as_secs_f64());
        match &result {
            Ok(_) => self.metrics.record_operation(action.as_str(), "committed"),
            Err(e) => self.metrics.record_operation(action.as_str(), e.status()),
        }
        result
    }

    async fn mutate_inner(
        &self,
        id: Uuid,
        action: ActionKind,
        amount: Decimal,
        reason: ChangeReason,
        operator: Option<Operator>,
    ) -> OpResult {
        let amount = self.money.clamp(amount);
        match action {
            // Zero deposits and withdrawals are no-ops nobody should ask for
            ActionKind::Deposit | ActionKind::Withdraw => {
                if amount <= Decimal::ZERO {
                    return Err(OpError::InvalidAmount);
                }
            }
            ActionKind::Set => {
                if amount < Decimal::ZERO {
                    return Err(OpError::InvalidAmount);
                }
            }
        }

        let account = self.cache.get(id).await.map_err(map_core_err)?;

        // The guard spans validate, hook, and commit. Nothing below awaits.
        let mut st = account.lock();
        let old = st.balance;

        let (proposed, signed_amount, log_amount) = match action {
            ActionKind::Deposit => {
                if self.money.exceeds_ceiling(old, amount) {
                    return Err(OpError::CeilingExceeded);
                }
                (self.money.add(old, amount), amount, amount)
            }
            ActionKind::Withdraw => {
                if old < amount {
                    return Err(OpError::InsufficientFunds);
                }
                (self.money.sub(old, amount), -amount, amount)
            }
            ActionKind::Set => {
                if amount > self.money.max_balance() {
                    return Err(OpError::CeilingExceeded);
                }
                (amount, amount - old, (amount - old).abs())
            }
        };

        let adjusted = self
            .hooks
            .evaluate(MutationContext {
                identity: id,
                name: st.name.clone(),
                old_balance: old,
                new_balance: proposed,
                amount: signed_amount,
                reason,
            })
            .ok_or(OpError::Cancelled)?;

        // A hook may propose any balance; the invariant holds anyway.
        let new_balance = self.money.bound(adjusted);
        if new_balance != proposed {
            debug!(identity = %id, %proposed, %new_balance, "interceptor adjusted balance");
        }

        let now = now_millis();
        st.balance = new_balance;
        if action == ActionKind::Deposit {
            // Income counts what was asked for, not what hooks made of it
            st.daily_income = self.money.add(st.daily_income, amount);
        }
        st.updated_at = now;
        st.dirty = true;
        let name = st.name.clone();
        drop(st);

        self.cache.writer().save_account(account.clone());
        if self.should_log(reason) {
            self.cache.writer().append_log(EconomyLog {
                identity: id,
                name: name.clone(),
                action,
                amount: log_amount,
                balance_before: old,
                balance_after: new_balance,
                operator: operator.as_ref().and_then(|op| op.id),
                operator_name: operator.map(|op| op.name),
                reason: reason.as_str().to_string(),
                timestamp: now,
            });
        }
        self.sync.read().publish_balance(id, &name, new_balance);

        debug!(
            identity = %id,
            action = action.as_str(),
            %old,
            %new_balance,
            reason = reason.as_str(),
            "mutation committed"
        );
        Ok(Committed {
            amount,
            new_balance,
        })
    }

    fn should_log(&self, reason: ChangeReason) -> bool {
        match reason {
            ChangeReason::Admin => self.logging.log_admin,
            ChangeReason::Payment | ChangeReason::PaymentReceived | ChangeReason::Tax => {
                self.logging.log_transfers
            }
            ChangeReason::Plugin | ChangeReason::Other => true,
        }
    }

    // ---- batch mutations ----

    /// Deposit to every targeted account, best effort
    pub async fn deposit_all(
        &self,
        target: BatchTarget,
        amount: Decimal,
        reason: ChangeReason,
        operator: Option<Operator>,
    ) -> crate::Result<BatchOutcome> {
        self.run_batch(ActionKind::Deposit, target, amount, reason, operator).await
    }

    /// Withdraw from every targeted account, best effort
    pub async fn withdraw_all(
        &self,
        target: BatchTarget,
        amount: Decimal,
        reason: ChangeReason,
        operator: Option<Operator>,
    ) -> crate::Result<BatchOutcome> {
        self.run_batch(ActionKind::Withdraw, target, amount, reason, operator).await
    }

    /// Set every targeted account, best effort
    pub async fn set_all(
        &self,
        target: BatchTarget,
        amount: Decimal,
        reason: ChangeReason,
        operator: Option<Operator>,
    ) -> crate::Result<BatchOutcome> {
        self.run_batch(ActionKind::Set, target, amount, reason, operator).await
    }

    async fn run_batch(
        &self,
        action: ActionKind,
        target: BatchTarget,
        amount: Decimal,
        reason: ChangeReason,
        operator: Option<Operator>,
    ) -> crate::Result<BatchOutcome> {
        let ids: Vec<Uuid> = match target {
            BatchTarget::All => self.cache.all_known_ids().await?,
            BatchTarget::Residents => self
                .cache
                .active_accounts()
                .iter()
                .map(|a| a.id())
                .collect(),
        };

        let mut outcome = BatchOutcome::default();
        for id in ids {
            let result = self
                .mutate(id, action, amount, reason, operator.clone())
                .await;
            match result {
                Ok(_) => outcome.succeeded += 1,
                Err(e) => {
                    outcome.failed += 1;
                    warn!(identity = %id, action = action.as_str(), "batch mutation skipped: {}", e);
                }
            }
        }
        Ok(outcome)
    }

    // ---- read surface ----

    /// Current balance; provisions the account if missing
    pub async fn balance(&self, id: Uuid) -> crate::Result<Decimal> {
        Ok(self.cache.get(id).await?.balance())
    }

    /// Can the account cover `amount`?
    pub async fn has(&self, id: Uuid, amount: Decimal) -> crate::Result<bool> {
        Ok(self.balance(id).await? >= self.money.clamp(amount))
    }

    /// Income accumulated since the last day boundary
    pub async fn daily_income(&self, id: Uuid) -> crate::Result<Decimal> {
        Ok(self.cache.get(id).await?.daily_income())
    }

    /// Does a row or resident entry exist, without provisioning?
    pub async fn account_exists(&self, id: Uuid) -> crate::Result<bool> {
        if self.cache.is_resident(id) {
            return Ok(true);
        }
        Ok(self.cache.store().get_account(id).await?.is_some())
    }
}

fn map_core_err(e: CoreError) -> OpError {
    match e {
        CoreError::StoreUnavailable(_) => OpError::StoreUnavailable,
        _ => OpError::AccountNotFound,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CacheConfig, CurrencyConfig, StoreConfig};
    use crate::hook::{BalanceInterceptor, HookOutcome};
    use crate::store::AccountStore;
    use crate::writer::spawn_writer;
    use parking_lot::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;

    fn dec(v: i64) -> Decimal {
        Decimal::from(v)
    }

    async fn build_engine(dir: &TempDir, currency: CurrencyConfig) -> Arc<EconomyEngine> {
        let store_cfg = StoreConfig {
            path: dir.path().join("economy.db"),
            ..StoreConfig::default()
        };
        let store = Arc::new(AccountStore::open(&store_cfg).await.unwrap());
        let metrics = Arc::new(Metrics::new().unwrap());
        let writer = spawn_writer(store.clone(), Duration::from_secs(30), metrics.clone());
        let money = Arc::new(MoneyContext::new(&currency));
        let cache = Arc::new(AccountCache::new(
            store,
            writer,
            money,
            CacheConfig::default(),
            currency.starting_balance,
            metrics.clone(),
        ));
        Arc::new(EconomyEngine::new(
            cache,
            Arc::new(InterceptorRegistry::new()),
            LoggingConfig::default(),
            metrics,
        ))
    }

    async fn seeded(dir: &TempDir, balance: i64) -> (Arc<EconomyEngine>, Uuid) {
        let engine = build_engine(dir, CurrencyConfig::default()).await;
        let id = Uuid::new_v4();
        engine.cache().activate(id, "Steve").await.unwrap();
        engine
            .set(id, dec(balance), ChangeReason::Other, None)
            .await
            .unwrap();
        (engine, id)
    }

    #[tokio::test]
    async fn test_deposit_commits_and_accumulates_income() {
        let dir = TempDir::new().unwrap();
        let (engine, id) = seeded(&dir, 100).await;

        let committed = engine
            .deposit(id, dec(50), ChangeReason::Admin, None)
            .await
            .unwrap();
        assert_eq!(committed.new_balance, dec(150));
        assert_eq!(engine.daily_income(id).await.unwrap(), dec(50));
    }

    #[tokio::test]
    async fn test_nonpositive_amounts_rejected() {
        let dir = TempDir::new().unwrap();
        let (engine, id) = seeded(&dir, 100).await;

        for amount in [dec(0), dec(-5)] {
            assert_eq!(
                engine.deposit(id, amount, ChangeReason::Admin, None).await,
                Err(OpError::InvalidAmount)
            );
            assert_eq!(
                engine.withdraw(id, amount, ChangeReason::Admin, None).await,
                Err(OpError::InvalidAmount)
            );
        }
        assert_eq!(
            engine.set(id, dec(-1), ChangeReason::Admin, None).await,
            Err(OpError::InvalidAmount)
        );
        assert_eq!(engine.balance(id).await.unwrap(), dec(100));
    }

    #[tokio::test]
    async fn test_deposit_past_ceiling_rejected() {
        let dir = TempDir::new().unwrap();
        let engine = build_engine(
            &dir,
            CurrencyConfig {
                max_balance: dec(100),
                ..CurrencyConfig::default()
            },
        )
        .await;
        let id = Uuid::new_v4();
        engine.cache().activate(id, "Steve").await.unwrap();
        engine.set(id, dec(50), ChangeReason::Other, None).await.unwrap();

        assert_eq!(
            engine.deposit(id, dec(60), ChangeReason::Admin, None).await,
            Err(OpError::CeilingExceeded)
        );
        assert_eq!(engine.balance(id).await.unwrap(), dec(50));

        // Landing exactly on the ceiling is allowed
        let committed = engine
            .deposit(id, dec(50), ChangeReason::Admin, None)
            .await
            .unwrap();
        assert_eq!(committed.new_balance, dec(100));
    }

    #[tokio::test]
    async fn test_set_above_ceiling_rejected() {
        let dir = TempDir::new().unwrap();
        let engine = build_engine(
            &dir,
            CurrencyConfig {
                max_balance: dec(300),
                ..CurrencyConfig::default()
            },
        )
        .await;
        let id = Uuid::new_v4();
        engine.cache().activate(id, "Steve").await.unwrap();
        engine.set(id, dec(100), ChangeReason::Other, None).await.unwrap();

        assert_eq!(
            engine.set(id, dec(500), ChangeReason::Admin, None).await,
            Err(OpError::CeilingExceeded)
        );
        assert_eq!(engine.balance(id).await.unwrap(), dec(100));

        // Setting exactly to the ceiling is allowed
        let committed = engine
            .set(id, dec(300), ChangeReason::Admin, None)
            .await
            .unwrap();
        assert_eq!(committed.new_balance, dec(300));
    }

    #[tokio::test]
    async fn test_withdraw_insufficient_funds() {
        let dir = TempDir::new().unwrap();
        let (engine, id) = seeded(&dir, 100).await;

        assert_eq!(
            engine.withdraw(id, dec(120), ChangeReason::Admin, None).await,
            Err(OpError::InsufficientFunds)
        );
        assert_eq!(engine.balance(id).await.unwrap(), dec(100));

        // Withdrawing the full balance is allowed
        let committed = engine
            .withdraw(id, dec(100), ChangeReason::Admin, None)
            .await
            .unwrap();
        assert_eq!(committed.new_balance, dec(0));
    }

    #[tokio::test]
    async fn test_set_logs_distance_from_old_balance() {
        let dir = TempDir::new().unwrap();
        let (engine, id) = seeded(&dir, 100).await;

        engine.set(id, dec(40), ChangeReason::Admin, None).await.unwrap();
        engine.cache().writer().flush().await.unwrap();

        let logs = engine.cache().store().logs_for(id, 10, 0).await.unwrap();
        let set_log = logs
            .iter()
            .find(|l| l.action == ActionKind::Set && l.balance_after == dec(40))
            .unwrap();
        assert_eq!(set_log.amount, dec(60));
        assert_eq!(set_log.balance_before, dec(100));
    }

    struct Cancel;
    impl BalanceInterceptor for Cancel {
        fn before_change(&self, _ctx: &MutationContext) -> HookOutcome {
            HookOutcome::Cancel
        }
    }

    #[tokio::test]
    async fn test_cancelled_mutation_leaves_no_trace() {
        let dir = TempDir::new().unwrap();
        let (engine, id) = seeded(&dir, 100).await;
        engine.hooks().register(Arc::new(Cancel));

        assert_eq!(
            engine.deposit(id, dec(50), ChangeReason::Admin, None).await,
            Err(OpError::Cancelled)
        );
        assert_eq!(engine.balance(id).await.unwrap(), dec(100));
        assert_eq!(engine.daily_income(id).await.unwrap(), dec(0));
    }

    struct SetTo(Decimal);
    impl BalanceInterceptor for SetTo {
        fn before_change(&self, _ctx: &MutationContext) -> HookOutcome {
            HookOutcome::Adjust(self.0)
        }
    }

    #[tokio::test]
    async fn test_hook_adjustment_is_bounded() {
        let dir = TempDir::new().unwrap();
        let engine = build_engine(
            &dir,
            CurrencyConfig {
                max_balance: dec(100),
                ..CurrencyConfig::default()
            },
        )
        .await;
        let id = Uuid::new_v4();
        engine.cache().activate(id, "Steve").await.unwrap();
        engine.hooks().register(Arc::new(SetTo(dec(1_000_000))));

        let committed = engine
            .deposit(id, dec(1), ChangeReason::Admin, None)
            .await
            .unwrap();
        assert_eq!(committed.new_balance, dec(100));
        // Income tracks the requested amount, not the adjusted balance
        assert_eq!(engine.daily_income(id).await.unwrap(), dec(1));
    }

    #[tokio::test]
    async fn test_concurrent_deposits_lose_nothing() {
        let dir = TempDir::new().unwrap();
        let (engine, id) = seeded(&dir, 0).await;

        let mut handles = Vec::new();
        for _ in 0..50 {
            let engine = engine.clone();
            handles.push(tokio::spawn(async move {
                engine.deposit(id, dec(1), ChangeReason::Plugin, None).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(engine.balance(id).await.unwrap(), dec(50));
        assert_eq!(engine.daily_income(id).await.unwrap(), dec(50));
    }

    #[tokio::test]
    async fn test_batch_residents_best_effort() {
        let dir = TempDir::new().unwrap();
        let engine = build_engine(&dir, CurrencyConfig::default()).await;

        let rich = Uuid::new_v4();
        let poor = Uuid::new_v4();
        engine.cache().activate(rich, "Rich").await.unwrap();
        engine.cache().activate(poor, "Poor").await.unwrap();
        engine.set(rich, dec(100), ChangeReason::Other, None).await.unwrap();

        let outcome = engine
            .withdraw_all(BatchTarget::Residents, dec(50), ChangeReason::Admin, None)
            .await
            .unwrap();
        assert_eq!(outcome.succeeded, 1);
        assert_eq!(outcome.failed, 1);
        assert_eq!(engine.balance(rich).await.unwrap(), dec(50));
        assert_eq!(engine.balance(poor).await.unwrap(), dec(0));
    }

    #[tokio::test]
    async fn test_batch_all_reaches_stored_accounts() {
        let dir = TempDir::new().unwrap();
        let engine = build_engine(&dir, CurrencyConfig::default()).await;

        let offline = Uuid::new_v4();
        engine.cache().activate(offline, "Gone").await.unwrap();
        engine.cache().flush_all().await.unwrap();
        engine.cache().evict(offline).await.unwrap();

        let outcome = engine
            .deposit_all(BatchTarget::All, dec(10), ChangeReason::Admin, None)
            .await
            .unwrap();
        assert_eq!(outcome.succeeded, 1);
        assert_eq!(engine.balance(offline).await.unwrap(), dec(10));
    }

    struct Recording(Mutex<Vec<(Uuid, Decimal)>>);
    impl BalanceSync for Recording {
        fn publish_balance(&self, identity: Uuid, _name: &str, balance: Decimal) {
            self.0.lock().push((identity, balance));
        }
        fn publish_income_reset(&self, _identity: Uuid) {}
    }

    #[tokio::test]
    async fn test_commits_are_published() {
        let dir = TempDir::new().unwrap();
        let (engine, id) = seeded(&dir, 100).await;
        let recording = Arc::new(Recording(Mutex::new(Vec::new())));
        engine.set_sync(recording.clone());

        engine.deposit(id, dec(25), ChangeReason::Admin, None).await.unwrap();
        let seen = recording.0.lock().clone();
        assert_eq!(seen, vec![(id, dec(125))]);

        // Rejected mutations publish nothing
        let _ = engine.withdraw(id, dec(9_999), ChangeReason::Admin, None).await;
        assert_eq!(recording.0.lock().len(), 1);
    }
}
