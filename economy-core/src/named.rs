//! Non-player accounts
//!
//! Name-keyed treasuries for organizations: same money rules and store gate
//! as player accounts, but no daily income, no interceptors, and no
//! replication. Writes go straight through to the store; a per-name async
//! mutex serializes concurrent mutations of the same account.

use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::engine::{Committed, OpError, OpResult};
use crate::error::Result;
use crate::money::MoneyContext;
use crate::store::AccountStore;
use crate::types::{now_millis, NamedAccount};

/// Non-player account manager
pub struct NamedAccounts {
    store: Arc<AccountStore>,
    money: Arc<MoneyContext>,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl NamedAccounts {
    /// Build a manager over the store
    pub fn new(store: Arc<AccountStore>, money: Arc<MoneyContext>) -> Self {
        Self {
            store,
            money,
            locks: DashMap::new(),
        }
    }

    fn lock_for(&self, name: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Create an account with an initial balance; fails open if it exists
    pub async fn create(&self, name: &str, initial: Decimal) -> Result<bool> {
        let lock = self.lock_for(name);
        let _guard = lock.lock().await;

        if self.store.get_named(name).await?.is_some() {
            return Ok(false);
        }
        let now = now_millis();
        self.store
            .save_named(&NamedAccount {
                name: name.to_string(),
                balance: self.money.bound(initial),
                created_at: now,
                updated_at: now,
            })
            .await?;
        debug!(account = name, "named account created");
        Ok(true)
    }

    /// Current balance, if the account exists
    pub async fn balance(&self, name: &str) -> Result<Option<Decimal>> {
        Ok(self.store.get_named(name).await?.map(|a| a.balance))
    }

    /// Can the account cover `amount`?
    pub async fn has(&self, name: &str, amount: Decimal) -> Result<bool> {
        let amount = self.money.clamp(amount);
        Ok(self
            .balance(name)
            .await?
            .map(|b| b >= amount)
            .unwrap_or(false))
    }

    /// Increase a balance
    pub async fn deposit(&self, name: &str, amount: Decimal) -> OpResult {
        let amount = self.money.clamp(amount);
        if amount <= Decimal::ZERO {
            return Err(OpError::InvalidAmount);
        }
        self.mutate(name, move |money, old| {
            if money.exceeds_ceiling(old, amount) {
                return Err(OpError::CeilingExceeded);
            }
            Ok(money.add(old, amount))
        })
        .await
        .map(|new_balance| Committed { amount, new_balance })
    }

    /// Decrease a balance
    pub async fn withdraw(&self, name: &str, amount: Decimal) -> OpResult {
        let amount = self.money.clamp(amount);
        if amount <= Decimal::ZERO {
            return Err(OpError::InvalidAmount);
        }
        self.mutate(name, move |money, old| {
            if old < amount {
                return Err(OpError::InsufficientFunds);
            }
            Ok(money.sub(old, amount))
        })
        .await
        .map(|new_balance| Committed { amount, new_balance })
    }

    /// Replace a balance outright
    pub async fn set(&self, name: &str, amount: Decimal) -> OpResult {
        let amount = self.money.clamp(amount);
        if amount < Decimal::ZERO {
            return Err(OpError::InvalidAmount);
        }
        if amount > self.money.max_balance() {
            return Err(OpError::CeilingExceeded);
        }
        self.mutate(name, move |_, _| Ok(amount))
            .await
            .map(|new_balance| Committed { amount, new_balance })
    }

    async fn mutate<F>(&self, name: &str, f: F) -> std::result::Result<Decimal, OpError>
    where
        F: FnOnce(&MoneyContext, Decimal) -> std::result::Result<Decimal, OpError>,
    {
        let lock = self.lock_for(name);
        let _guard = lock.lock().await;

        let mut account = self
            .store
            .get_named(name)
            .await
            .map_err(|_| OpError::StoreUnavailable)?
            .ok_or(OpError::AccountNotFound)?;

        let new_balance = f(&self.money, account.balance)?;
        account.balance = new_balance;
        account.updated_at = now_millis();
        self.store
            .save_named(&account)
            .await
            .map_err(|_| OpError::StoreUnavailable)?;
        Ok(new_balance)
    }

    /// Delete an account; returns whether it existed
    pub async fn remove(&self, name: &str) -> Result<bool> {
        let lock = self.lock_for(name);
        let _guard = lock.lock().await;
        let existed = self.store.delete_named(name).await?;
        drop(_guard);
        self.locks.remove(name);
        Ok(existed)
    }

    /// Every account, ordered by name
    pub async fn list(&self) -> Result<Vec<NamedAccount>> {
        self.store.list_named().await
    }
}
