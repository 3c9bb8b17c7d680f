//! Embedded relational store
//!
//! One SQLite database holds five tables: accounts, transactions, logs,
//! offline tips, and non-player accounts. The embedded engine is
//! single-writer, so every access goes through a process-wide reader/writer
//! gate: reads share it, writes take it exclusively. Each query is bounded by
//! a configured timeout so a stalled disk never wedges a caller.

use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::types::{
    now_millis, AccountSnapshot, EconomyLog, NamedAccount, OfflineTip, TransactionRecord,
};

const SCHEMA_VERSION: i64 = 1;

const MILLIS_PER_DAY: i64 = 86_400_000;

/// Account store over an embedded SQLite database
pub struct AccountStore {
    pool: SqlitePool,
    gate: RwLock<()>,
    query_timeout: Duration,
}

impl AccountStore {
    /// Open (creating if missing) the database and ensure the schema exists
    pub async fn open(cfg: &StoreConfig) -> Result<Self> {
        if let Some(parent) = cfg.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(&cfg.path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(cfg.max_connections)
            .connect_with(options)
            .await?;

        let store = Self {
            pool,
            gate: RwLock::new(()),
            query_timeout: Duration::from_millis(cfg.query_timeout_ms),
        };

        store.create_schema().await?;
        info!(path = %cfg.path.display(), "account store opened");
        Ok(store)
    }

    async fn create_schema(&self) -> Result<()> {
        let _gate = self.gate.write().await;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS accounts (
                uuid TEXT PRIMARY KEY,
                player_name TEXT NOT NULL,
                balance TEXT NOT NULL,
                daily_income TEXT NOT NULL,
                last_income_reset INTEGER NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_accounts_name ON accounts (player_name)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS transactions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                sender_uuid TEXT NOT NULL,
                sender_name TEXT NOT NULL,
                receiver_uuid TEXT NOT NULL,
                receiver_name TEXT NOT NULL,
                amount TEXT NOT NULL,
                tax TEXT NOT NULL,
                timestamp INTEGER NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_transactions_sender ON transactions (sender_uuid)",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_transactions_receiver ON transactions (receiver_uuid)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                uuid TEXT NOT NULL,
                player_name TEXT NOT NULL,
                action TEXT NOT NULL,
                amount TEXT NOT NULL,
                balance_before TEXT NOT NULL,
                balance_after TEXT NOT NULL,
                operator TEXT,
                operator_name TEXT,
                reason TEXT NOT NULL,
                timestamp INTEGER NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_logs_uuid ON logs (uuid)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS offline_tips (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                receiver_uuid TEXT NOT NULL,
                sender_name TEXT NOT NULL,
                amount TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                notified INTEGER NOT NULL DEFAULT 0
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_tips_receiver ON offline_tips (receiver_uuid)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS non_player_accounts (
                account_name TEXT PRIMARY KEY,
                balance TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)")
            .execute(&self.pool)
            .await?;

        let row = sqlx::query("SELECT version FROM schema_version LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => {
                let version: i64 = row.try_get("version")?;
                if version != SCHEMA_VERSION {
                    return Err(Error::Store(format!(
                        "unsupported schema version {} (expected {})",
                        version, SCHEMA_VERSION
                    )));
                }
            }
            None => {
                sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
                    .bind(SCHEMA_VERSION)
                    .execute(&self.pool)
                    .await?;
            }
        }

        Ok(())
    }

    async fn timed<T>(&self, what: &str, fut: impl Future<Output = T>) -> Result<T> {
        tokio::time::timeout(self.query_timeout, fut)
            .await
            .map_err(|_| Error::StoreUnavailable(format!("{} timed out", what)))
    }

    // ---- accounts ----

    /// Fetch an account row by identity
    pub async fn get_account(&self, id: Uuid) -> Result<Option<AccountSnapshot>> {
        let fut = async {
            let _gate = self.gate.read().await;
            sqlx::query("SELECT * FROM accounts WHERE uuid = ?")
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await
        };
        let row = self.timed("account lookup", fut).await??;
        row.as_ref().map(account_from_row).transpose()
    }

    /// Fetch an account row by display name
    pub async fn get_account_by_name(
        &self,
        name: &str,
        ignore_case: bool,
    ) -> Result<Option<AccountSnapshot>> {
        let sql = if ignore_case {
            "SELECT * FROM accounts WHERE player_name = ? COLLATE NOCASE LIMIT 1"
        } else {
            "SELECT * FROM accounts WHERE player_name = ? LIMIT 1"
        };
        let fut = async {
            let _gate = self.gate.read().await;
            sqlx::query(sql).bind(name).fetch_optional(&self.pool).await
        };
        let row = self.timed("account name lookup", fut).await??;
        row.as_ref().map(account_from_row).transpose()
    }

    /// Insert or update an account row
    pub async fn save_account(&self, snap: &AccountSnapshot) -> Result<()> {
        let fut = async {
            let _gate = self.gate.write().await;
            sqlx::query(
                "INSERT INTO accounts
                    (uuid, player_name, balance, daily_income, last_income_reset, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(uuid) DO UPDATE SET
                    player_name = excluded.player_name,
                    balance = excluded.balance,
                    daily_income = excluded.daily_income,
                    last_income_reset = excluded.last_income_reset,
                    updated_at = excluded.updated_at",
            )
            .bind(snap.id.to_string())
            .bind(&snap.name)
            .bind(snap.balance.to_string())
            .bind(snap.daily_income.to_string())
            .bind(snap.last_income_reset)
            .bind(snap.created_at)
            .bind(snap.updated_at)
            .execute(&self.pool)
            .await
        };
        self.timed("account save", fut).await??;
        debug!(identity = %snap.id, "account row saved");
        Ok(())
    }

    /// Insert a fresh account row, leaving any existing row untouched
    pub async fn insert_account_if_absent(&self, snap: &AccountSnapshot) -> Result<()> {
        let fut = async {
            let _gate = self.gate.write().await;
            sqlx::query(
                "INSERT INTO accounts
                    (uuid, player_name, balance, daily_income, last_income_reset, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(uuid) DO NOTHING",
            )
            .bind(snap.id.to_string())
            .bind(&snap.name)
            .bind(snap.balance.to_string())
            .bind(snap.daily_income.to_string())
            .bind(snap.last_income_reset)
            .bind(snap.created_at)
            .bind(snap.updated_at)
            .execute(&self.pool)
            .await
        };
        self.timed("account insert", fut).await??;
        Ok(())
    }

    /// All account rows
    pub async fn all_accounts(&self) -> Result<Vec<AccountSnapshot>> {
        let fut = async {
            let _gate = self.gate.read().await;
            sqlx::query("SELECT * FROM accounts")
                .fetch_all(&self.pool)
                .await
        };
        let rows = self.timed("account scan", fut).await??;
        rows.iter().map(account_from_row).collect()
    }

    /// Top accounts by balance, highest first
    pub async fn top_by_balance(&self, limit: usize) -> Result<Vec<AccountSnapshot>> {
        self.top_accounts("balance", limit).await
    }

    /// Top accounts by daily income, highest first
    pub async fn top_by_income(&self, limit: usize) -> Result<Vec<AccountSnapshot>> {
        self.top_accounts("daily_income", limit).await
    }

    // Amounts are canonical non-negative decimal text, so a longer integer
    // part always means a larger value and equal-length integer parts order
    // lexicographically. A REAL cast would lose digits past 2^53.
    async fn top_accounts(&self, column: &str, limit: usize) -> Result<Vec<AccountSnapshot>> {
        let sql = format!(
            "SELECT * FROM accounts ORDER BY instr({col} || '.', '.') DESC, {col} DESC LIMIT ?",
            col = column
        );
        let fut = async {
            let _gate = self.gate.read().await;
            sqlx::query(&sql)
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await
        };
        let rows = self.timed("top accounts", fut).await??;
        rows.iter().map(account_from_row).collect()
    }

    /// Sum of all balances
    pub async fn total_balance(&self) -> Result<Decimal> {
        self.sum_column("balance").await
    }

    /// Sum of all daily-income accumulators
    pub async fn total_daily_income(&self) -> Result<Decimal> {
        self.sum_column("daily_income").await
    }

    // Exact sums: decimal strings are re-added in process rather than summed
    // as floats inside the engine.
    async fn sum_column(&self, column: &str) -> Result<Decimal> {
        let sql = format!("SELECT {} FROM accounts", column);
        let fut = async {
            let _gate = self.gate.read().await;
            sqlx::query(&sql).fetch_all(&self.pool).await
        };
        let rows = self.timed("aggregate sum", fut).await??;
        let mut total = Decimal::ZERO;
        for row in &rows {
            let text: String = row.try_get(0)?;
            total += parse_dec(&text)?;
        }
        Ok(total)
    }

    /// Number of account rows
    pub async fn count_accounts(&self) -> Result<i64> {
        let fut = async {
            let _gate = self.gate.read().await;
            sqlx::query("SELECT COUNT(*) AS n FROM accounts")
                .fetch_one(&self.pool)
                .await
        };
        let row = self.timed("account count", fut).await??;
        Ok(row.try_get("n")?)
    }

    // ---- audit journal ----

    /// Append one journal entry
    pub async fn append_log(&self, log: &EconomyLog) -> Result<()> {
        let fut = async {
            let _gate = self.gate.write().await;
            sqlx::query(
                "INSERT INTO logs
                    (uuid, player_name, action, amount, balance_before, balance_after,
                     operator, operator_name, reason, timestamp)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(log.identity.to_string())
            .bind(&log.name)
            .bind(log.action.as_str())
            .bind(log.amount.to_string())
            .bind(log.balance_before.to_string())
            .bind(log.balance_after.to_string())
            .bind(log.operator.map(|id| id.to_string()))
            .bind(log.operator_name.as_deref())
            .bind(&log.reason)
            .bind(log.timestamp)
            .execute(&self.pool)
            .await
        };
        self.timed("log append", fut).await??;
        Ok(())
    }

    /// Journal entries for one identity, newest first
    pub async fn logs_for(&self, id: Uuid, limit: usize, offset: usize) -> Result<Vec<EconomyLog>> {
        let fut = async {
            let _gate = self.gate.read().await;
            sqlx::query(
                "SELECT * FROM logs WHERE uuid = ? ORDER BY timestamp DESC, id DESC LIMIT ? OFFSET ?",
            )
            .bind(id.to_string())
            .bind(limit as i64)
            .bind(offset as i64)
            .fetch_all(&self.pool)
            .await
        };
        let rows = self.timed("log history", fut).await??;
        rows.iter().map(log_from_row).collect()
    }

    // ---- transfers ----

    /// Append one transfer record
    pub async fn append_transaction(&self, txn: &TransactionRecord) -> Result<()> {
        let fut = async {
            let _gate = self.gate.write().await;
            sqlx::query(
                "INSERT INTO transactions
                    (sender_uuid, sender_name, receiver_uuid, receiver_name, amount, tax, timestamp)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(txn.sender.to_string())
            .bind(&txn.sender_name)
            .bind(txn.receiver.to_string())
            .bind(&txn.receiver_name)
            .bind(txn.amount.to_string())
            .bind(txn.tax.to_string())
            .bind(txn.timestamp)
            .execute(&self.pool)
            .await
        };
        self.timed("transaction append", fut).await??;
        Ok(())
    }

    /// Transfer records touching one identity (either side), newest first
    pub async fn transactions_for(
        &self,
        id: Uuid,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<TransactionRecord>> {
        let fut = async {
            let _gate = self.gate.read().await;
            sqlx::query(
                "SELECT * FROM transactions
                 WHERE sender_uuid = ? OR receiver_uuid = ?
                 ORDER BY timestamp DESC, id DESC LIMIT ? OFFSET ?",
            )
            .bind(id.to_string())
            .bind(id.to_string())
            .bind(limit as i64)
            .bind(offset as i64)
            .fetch_all(&self.pool)
            .await
        };
        let rows = self.timed("transaction history", fut).await??;
        rows.iter().map(txn_from_row).collect()
    }

    // ---- offline tips ----

    /// Record a tip for a receiver who was not resident
    pub async fn insert_tip(
        &self,
        receiver: Uuid,
        sender_name: &str,
        amount: Decimal,
        timestamp: i64,
    ) -> Result<()> {
        let fut = async {
            let _gate = self.gate.write().await;
            sqlx::query(
                "INSERT INTO offline_tips (receiver_uuid, sender_name, amount, timestamp, notified)
                 VALUES (?, ?, ?, ?, 0)",
            )
            .bind(receiver.to_string())
            .bind(sender_name)
            .bind(amount.to_string())
            .bind(timestamp)
            .execute(&self.pool)
            .await
        };
        self.timed("tip insert", fut).await??;
        Ok(())
    }

    /// Count of unnotified tips for a receiver
    pub async fn unnotified_tip_count(&self, receiver: Uuid) -> Result<i64> {
        let fut = async {
            let _gate = self.gate.read().await;
            sqlx::query(
                "SELECT COUNT(*) AS n FROM offline_tips WHERE receiver_uuid = ? AND notified = 0",
            )
            .bind(receiver.to_string())
            .fetch_one(&self.pool)
            .await
        };
        let row = self.timed("tip count", fut).await??;
        Ok(row.try_get("n")?)
    }

    /// Unnotified tips for a receiver, oldest first
    pub async fn unnotified_tips(&self, receiver: Uuid) -> Result<Vec<OfflineTip>> {
        let fut = async {
            let _gate = self.gate.read().await;
            sqlx::query(
                "SELECT * FROM offline_tips WHERE receiver_uuid = ? AND notified = 0
                 ORDER BY timestamp ASC",
            )
            .bind(receiver.to_string())
            .fetch_all(&self.pool)
            .await
        };
        let rows = self.timed("tip scan", fut).await??;
        rows.iter().map(tip_from_row).collect()
    }

    /// Mark every tip for a receiver as notified (rows are kept, not deleted)
    pub async fn mark_tips_notified(&self, receiver: Uuid) -> Result<()> {
        let fut = async {
            let _gate = self.gate.write().await;
            sqlx::query("UPDATE offline_tips SET notified = 1 WHERE receiver_uuid = ?")
                .bind(receiver.to_string())
                .execute(&self.pool)
                .await
        };
        self.timed("tip mark", fut).await??;
        Ok(())
    }

    // ---- non-player accounts ----

    /// Fetch a non-player account row
    pub async fn get_named(&self, name: &str) -> Result<Option<NamedAccount>> {
        let fut = async {
            let _gate = self.gate.read().await;
            sqlx::query("SELECT * FROM non_player_accounts WHERE account_name = ?")
                .bind(name)
                .fetch_optional(&self.pool)
                .await
        };
        let row = self.timed("named lookup", fut).await??;
        row.as_ref().map(named_from_row).transpose()
    }

    /// Insert or update a non-player account row
    pub async fn save_named(&self, account: &NamedAccount) -> Result<()> {
        let fut = async {
            let _gate = self.gate.write().await;
            sqlx::query(
                "INSERT INTO non_player_accounts (account_name, balance, created_at, updated_at)
                 VALUES (?, ?, ?, ?)
                 ON CONFLICT(account_name) DO UPDATE SET
                    balance = excluded.balance,
                    updated_at = excluded.updated_at",
            )
            .bind(&account.name)
            .bind(account.balance.to_string())
            .bind(account.created_at)
            .bind(account.updated_at)
            .execute(&self.pool)
            .await
        };
        self.timed("named save", fut).await??;
        Ok(())
    }

    /// Delete a non-player account row; returns whether a row existed
    pub async fn delete_named(&self, name: &str) -> Result<bool> {
        let fut = async {
            let _gate = self.gate.write().await;
            sqlx::query("DELETE FROM non_player_accounts WHERE account_name = ?")
                .bind(name)
                .execute(&self.pool)
                .await
        };
        let done = self.timed("named delete", fut).await??;
        Ok(done.rows_affected() > 0)
    }

    /// All non-player account rows
    pub async fn list_named(&self) -> Result<Vec<NamedAccount>> {
        let fut = async {
            let _gate = self.gate.read().await;
            sqlx::query("SELECT * FROM non_player_accounts ORDER BY account_name")
                .fetch_all(&self.pool)
                .await
        };
        let rows = self.timed("named scan", fut).await??;
        rows.iter().map(named_from_row).collect()
    }

    // ---- retention ----

    /// Delete journal, transfer, and tip rows older than the retention window
    pub async fn cleanup(&self, retention_days: u32) -> Result<u64> {
        let cutoff = now_millis() - i64::from(retention_days) * MILLIS_PER_DAY;
        let mut removed = 0u64;

        for table in ["logs", "transactions", "offline_tips"] {
            let sql = format!("DELETE FROM {} WHERE timestamp < ?", table);
            let fut = async {
                let _gate = self.gate.write().await;
                sqlx::query(&sql).bind(cutoff).execute(&self.pool).await
            };
            let done = self.timed("retention cleanup", fut).await??;
            removed += done.rows_affected();
        }

        if removed > 0 {
            info!(removed, retention_days, "retention cleanup removed rows");
        }
        Ok(removed)
    }
}

fn parse_dec(text: &str) -> Result<Decimal> {
    Decimal::from_str(text).map_err(|e| Error::CorruptRow(format!("bad decimal '{}': {}", text, e)))
}

fn parse_uuid(text: &str) -> Result<Uuid> {
    Uuid::parse_str(text).map_err(|e| Error::CorruptRow(format!("bad uuid '{}': {}", text, e)))
}

fn account_from_row(row: &SqliteRow) -> Result<AccountSnapshot> {
    Ok(AccountSnapshot {
        id: parse_uuid(&row.try_get::<String, _>("uuid")?)?,
        name: row.try_get("player_name")?,
        balance: parse_dec(&row.try_get::<String, _>("balance")?)?,
        daily_income: parse_dec(&row.try_get::<String, _>("daily_income")?)?,
        last_income_reset: row.try_get("last_income_reset")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn log_from_row(row: &SqliteRow) -> Result<EconomyLog> {
    let action = match row.try_get::<String, _>("action")?.as_str() {
        "DEPOSIT" => crate::types::ActionKind::Deposit,
        "WITHDRAW" => crate::types::ActionKind::Withdraw,
        "SET" => crate::types::ActionKind::Set,
        other => return Err(Error::CorruptRow(format!("bad action '{}'", other))),
    };
    let operator: Option<String> = row.try_get("operator")?;
    Ok(EconomyLog {
        identity: parse_uuid(&row.try_get::<String, _>("uuid")?)?,
        name: row.try_get("player_name")?,
        action,
        amount: parse_dec(&row.try_get::<String, _>("amount")?)?,
        balance_before: parse_dec(&row.try_get::<String, _>("balance_before")?)?,
        balance_after: parse_dec(&row.try_get::<String, _>("balance_after")?)?,
        operator: operator.as_deref().map(parse_uuid).transpose()?,
        operator_name: row.try_get("operator_name")?,
        reason: row.try_get("reason")?,
        timestamp: row.try_get("timestamp")?,
    })
}

fn txn_from_row(row: &SqliteRow) -> Result<TransactionRecord> {
    Ok(TransactionRecord {
        sender: parse_uuid(&row.try_get::<String, _>("sender_uuid")?)?,
        sender_name: row.try_get("sender_name")?,
        receiver: parse_uuid(&row.try_get::<String, _>("receiver_uuid")?)?,
        receiver_name: row.try_get("receiver_name")?,
        amount: parse_dec(&row.try_get::<String, _>("amount")?)?,
        tax: parse_dec(&row.try_get::<String, _>("tax")?)?,
        timestamp: row.try_get("timestamp")?,
    })
}

fn tip_from_row(row: &SqliteRow) -> Result<OfflineTip> {
    let notified: i64 = row.try_get("notified")?;
    Ok(OfflineTip {
        id: row.try_get("id")?,
        receiver: parse_uuid(&row.try_get::<String, _>("receiver_uuid")?)?,
        sender_name: row.try_get("sender_name")?,
        amount: parse_dec(&row.try_get::<String, _>("amount")?)?,
        timestamp: row.try_get("timestamp")?,
        notified: notified != 0,
    })
}

fn named_from_row(row: &SqliteRow) -> Result<NamedAccount> {
    Ok(NamedAccount {
        name: row.try_get("account_name")?,
        balance: parse_dec(&row.try_get::<String, _>("balance")?)?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ActionKind;
    use tempfile::TempDir;

    async fn open_store(dir: &TempDir) -> AccountStore {
        let cfg = StoreConfig {
            path: dir.path().join("economy.db"),
            ..StoreConfig::default()
        };
        AccountStore::open(&cfg).await.unwrap()
    }

    fn snap(name: &str, balance: &str, income: &str) -> AccountSnapshot {
        let now = now_millis();
        AccountSnapshot {
            id: Uuid::new_v4(),
            name: name.to_string(),
            balance: Decimal::from_str(balance).unwrap(),
            daily_income: Decimal::from_str(income).unwrap(),
            last_income_reset: now,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_open_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let cfg = StoreConfig {
            path: dir.path().join("economy.db"),
            ..StoreConfig::default()
        };
        drop(AccountStore::open(&cfg).await.unwrap());
        AccountStore::open(&cfg).await.unwrap();
    }

    #[tokio::test]
    async fn test_account_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;

        let original = snap("Steve", "123.45", "10.00");
        store.save_account(&original).await.unwrap();

        let loaded = store.get_account(original.id).await.unwrap().unwrap();
        assert_eq!(loaded, original);

        let by_name = store
            .get_account_by_name("Steve", false)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_name.id, original.id);

        assert!(store
            .get_account_by_name("steve", false)
            .await
            .unwrap()
            .is_none());
        assert!(store
            .get_account_by_name("steve", true)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_insert_if_absent_keeps_existing_row() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;

        let mut original = snap("Alex", "50", "0");
        store.save_account(&original).await.unwrap();

        original.balance = Decimal::from(999);
        store.insert_account_if_absent(&original).await.unwrap();

        let loaded = store.get_account(original.id).await.unwrap().unwrap();
        assert_eq!(loaded.balance, Decimal::from(50));
    }

    #[tokio::test]
    async fn test_top_and_sums() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;

        store.save_account(&snap("a", "10", "1")).await.unwrap();
        store.save_account(&snap("b", "30", "3")).await.unwrap();
        store.save_account(&snap("c", "20", "2")).await.unwrap();

        let top = store.top_by_balance(2).await.unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].name, "b");
        assert_eq!(top[1].name, "c");

        let by_income = store.top_by_income(1).await.unwrap();
        assert_eq!(by_income[0].name, "b");

        assert_eq!(store.total_balance().await.unwrap(), Decimal::from(60));
        assert_eq!(store.total_daily_income().await.unwrap(), Decimal::from(6));
        assert_eq!(store.count_accounts().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_top_ordering_is_exact_for_large_balances() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;

        // Adjacent values above 2^53 collapse to the same f64.
        store
            .save_account(&snap("low", "10000000000000001", "0"))
            .await
            .unwrap();
        store
            .save_account(&snap("high", "10000000000000002", "0"))
            .await
            .unwrap();
        store.save_account(&snap("frac", "99.5", "0")).await.unwrap();
        store.save_account(&snap("round", "100", "0")).await.unwrap();

        let top = store.top_by_balance(4).await.unwrap();
        let names: Vec<&str> = top.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["high", "low", "round", "frac"]);
    }

    #[tokio::test]
    async fn test_log_history_newest_first() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;
        let id = Uuid::new_v4();

        for i in 0..3 {
            store
                .append_log(&EconomyLog {
                    identity: id,
                    name: "Steve".to_string(),
                    action: ActionKind::Deposit,
                    amount: Decimal::from(i),
                    balance_before: Decimal::ZERO,
                    balance_after: Decimal::from(i),
                    operator: None,
                    operator_name: None,
                    reason: "ADMIN".to_string(),
                    timestamp: 1_000 + i64::from(i),
                })
                .await
                .unwrap();
        }

        let logs = store.logs_for(id, 2, 0).await.unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].amount, Decimal::from(2));
        assert_eq!(logs[1].amount, Decimal::from(1));

        let page2 = store.logs_for(id, 2, 2).await.unwrap();
        assert_eq!(page2.len(), 1);
        assert_eq!(page2[0].amount, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_tips_mark_notified_keeps_rows() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;
        let receiver = Uuid::new_v4();

        store
            .insert_tip(receiver, "Alex", Decimal::from(25), now_millis())
            .await
            .unwrap();
        store
            .insert_tip(receiver, "Casey", Decimal::from(5), now_millis())
            .await
            .unwrap();

        assert_eq!(store.unnotified_tip_count(receiver).await.unwrap(), 2);
        let tips = store.unnotified_tips(receiver).await.unwrap();
        assert_eq!(tips.len(), 2);
        assert!(!tips[0].notified);

        store.mark_tips_notified(receiver).await.unwrap();
        assert_eq!(store.unnotified_tip_count(receiver).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_named_account_lifecycle() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;
        let now = now_millis();

        let account = NamedAccount {
            name: "town_bank".to_string(),
            balance: Decimal::from(1_000),
            created_at: now,
            updated_at: now,
        };
        store.save_named(&account).await.unwrap();

        let loaded = store.get_named("town_bank").await.unwrap().unwrap();
        assert_eq!(loaded, account);

        assert_eq!(store.list_named().await.unwrap().len(), 1);
        assert!(store.delete_named("town_bank").await.unwrap());
        assert!(!store.delete_named("town_bank").await.unwrap());
        assert!(store.get_named("town_bank").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cleanup_removes_old_rows() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;
        let id = Uuid::new_v4();

        // One ancient row, one current row
        store
            .append_log(&EconomyLog {
                identity: id,
                name: "Steve".to_string(),
                action: ActionKind::Set,
                amount: Decimal::ZERO,
                balance_before: Decimal::ZERO,
                balance_after: Decimal::ZERO,
                operator: None,
                operator_name: None,
                reason: "ADMIN".to_string(),
                timestamp: 0,
            })
            .await
            .unwrap();
        store.insert_tip(id, "Alex", Decimal::ONE, now_millis()).await.unwrap();

        let removed = store.cleanup(30).await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.unnotified_tip_count(id).await.unwrap(), 1);
    }
}
