//! Core types for the economy ledger

use chrono::Utc;
use parking_lot::{Mutex, MutexGuard};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current time as epoch milliseconds
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Mutation kind recorded in the audit journal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionKind {
    /// Balance increased by an amount
    Deposit,
    /// Balance decreased by an amount
    Withdraw,
    /// Balance replaced outright
    Set,
}

impl ActionKind {
    /// Stable string form used in the journal and in metrics labels
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Deposit => "DEPOSIT",
            ActionKind::Withdraw => "WITHDRAW",
            ActionKind::Set => "SET",
        }
    }
}

/// Why a balance changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeReason {
    /// Operator-initiated mutation (includes compensations)
    Admin,
    /// Sender leg of a transfer
    Payment,
    /// Receiver leg of a transfer
    PaymentReceived,
    /// Tax collected on a transfer
    Tax,
    /// Programmatic mutation by an embedding collaborator
    Plugin,
    /// Anything else
    Other,
}

impl ChangeReason {
    /// Stable string form used in the journal
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeReason::Admin => "ADMIN",
            ChangeReason::Payment => "PAYMENT",
            ChangeReason::PaymentReceived => "PAYMENT_RECEIVED",
            ChangeReason::Tax => "TAX",
            ChangeReason::Plugin => "PLUGIN",
            ChangeReason::Other => "OTHER",
        }
    }
}

/// Who performed a mutation, when known
#[derive(Debug, Clone)]
pub struct Operator {
    /// Identity of the operator; `None` for the console
    pub id: Option<Uuid>,
    /// Display name of the operator
    pub name: String,
}

/// Point-in-time copy of an account row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    /// Stable identity
    pub id: Uuid,
    /// Last known display name
    pub name: String,
    /// Current balance
    pub balance: Decimal,
    /// Income accumulated since the last day boundary
    pub daily_income: Decimal,
    /// Epoch millis of the last daily-income reset
    pub last_income_reset: i64,
    /// Epoch millis the row was created
    pub created_at: i64,
    /// Epoch millis of the last mutation
    pub updated_at: i64,
}

/// Mutable in-memory account state, guarded by the account mutex
#[derive(Debug, Clone)]
pub struct AccountState {
    /// Display name
    pub name: String,
    /// Current balance
    pub balance: Decimal,
    /// Income accumulated since the last day boundary
    pub daily_income: Decimal,
    /// Epoch millis of the last daily-income reset
    pub last_income_reset: i64,
    /// Epoch millis the row was created
    pub created_at: i64,
    /// Epoch millis of the last mutation
    pub updated_at: i64,
    /// Set on every mutation, cleared after a durable write
    pub dirty: bool,
}

/// A cached account: stable identity plus mutex-guarded state
///
/// Compound mutations (validate, hook, commit) hold the mutex for their whole
/// duration. Nothing awaits while the guard is held.
#[derive(Debug)]
pub struct Account {
    id: Uuid,
    state: Mutex<AccountState>,
}

impl Account {
    /// Wrap a loaded snapshot
    pub fn from_snapshot(snap: AccountSnapshot) -> Self {
        Self {
            id: snap.id,
            state: Mutex::new(AccountState {
                name: snap.name,
                balance: snap.balance,
                daily_income: snap.daily_income,
                last_income_reset: snap.last_income_reset,
                created_at: snap.created_at,
                updated_at: snap.updated_at,
                dirty: false,
            }),
        }
    }

    /// Create a fresh account with the starting balance
    pub fn new(id: Uuid, name: String, starting_balance: Decimal) -> Self {
        let now = now_millis();
        Self {
            id,
            state: Mutex::new(AccountState {
                name,
                balance: starting_balance,
                daily_income: Decimal::ZERO,
                last_income_reset: now,
                created_at: now,
                updated_at: now,
                dirty: false,
            }),
        }
    }

    /// Stable identity
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Display name
    pub fn name(&self) -> String {
        self.state.lock().name.clone()
    }

    /// Current balance
    pub fn balance(&self) -> Decimal {
        self.state.lock().balance
    }

    /// Income accumulated since the last day boundary
    pub fn daily_income(&self) -> Decimal {
        self.state.lock().daily_income
    }

    /// Is there unsaved state?
    pub fn is_dirty(&self) -> bool {
        self.state.lock().dirty
    }

    /// Acquire the state guard for a compound mutation
    pub fn lock(&self) -> MutexGuard<'_, AccountState> {
        self.state.lock()
    }

    /// Copy the current state
    pub fn snapshot(&self) -> AccountSnapshot {
        let st = self.state.lock();
        AccountSnapshot {
            id: self.id,
            name: st.name.clone(),
            balance: st.balance,
            daily_income: st.daily_income,
            last_income_reset: st.last_income_reset,
            created_at: st.created_at,
            updated_at: st.updated_at,
        }
    }

    /// Overwrite the balance (replication apply path)
    pub fn set_balance(&self, balance: Decimal) {
        let mut st = self.state.lock();
        st.balance = balance;
        st.updated_at = now_millis();
        st.dirty = true;
    }

    /// Zero the daily-income accumulator
    pub fn reset_daily_income(&self, at_millis: i64) {
        let mut st = self.state.lock();
        st.daily_income = Decimal::ZERO;
        st.last_income_reset = at_millis;
        st.dirty = true;
    }

    /// Change the display name
    pub fn rename(&self, name: String) {
        let mut st = self.state.lock();
        if st.name != name {
            st.name = name;
            st.updated_at = now_millis();
            st.dirty = true;
        }
    }

    /// Clear the dirty flag if the state has not moved past `saved_at`
    ///
    /// Called by the write-back actor after a durable write. A concurrent
    /// mutation bumps `updated_at`, which keeps the flag set.
    pub fn mark_saved(&self, saved_at: i64) {
        let mut st = self.state.lock();
        if st.updated_at <= saved_at {
            st.dirty = false;
        }
    }
}

/// One entry in the audit journal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EconomyLog {
    /// Affected identity
    pub identity: Uuid,
    /// Display name at mutation time
    pub name: String,
    /// Mutation kind
    pub action: ActionKind,
    /// Amount applied (for Set, the distance from the old balance)
    pub amount: Decimal,
    /// Balance before the mutation
    pub balance_before: Decimal,
    /// Balance after the mutation
    pub balance_after: Decimal,
    /// Operator identity, when known
    pub operator: Option<Uuid>,
    /// Operator display name, when known
    pub operator_name: Option<String>,
    /// Reason tag
    pub reason: String,
    /// Epoch millis the mutation committed
    pub timestamp: i64,
}

/// Immutable record of a completed transfer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Sending identity
    pub sender: Uuid,
    /// Sender display name
    pub sender_name: String,
    /// Receiving identity
    pub receiver: Uuid,
    /// Receiver display name
    pub receiver_name: String,
    /// Amount credited to the receiver
    pub amount: Decimal,
    /// Tax charged on top of the amount
    pub tax: Decimal,
    /// Epoch millis the transfer completed
    pub timestamp: i64,
}

/// Pending notification for a receiver who was not resident
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfflineTip {
    /// Row id
    pub id: i64,
    /// Receiving identity
    pub receiver: Uuid,
    /// Sender display name
    pub sender_name: String,
    /// Amount received
    pub amount: Decimal,
    /// Epoch millis the transfer completed
    pub timestamp: i64,
    /// Has the receiver been told yet?
    pub notified: bool,
}

/// A non-player account row (organizational treasury)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedAccount {
    /// Unique account name
    pub name: String,
    /// Current balance
    pub balance: Decimal,
    /// Epoch millis the row was created
    pub created_at: i64,
    /// Epoch millis of the last mutation
    pub updated_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_kind_strings() {
        assert_eq!(ActionKind::Deposit.as_str(), "DEPOSIT");
        assert_eq!(ActionKind::Withdraw.as_str(), "WITHDRAW");
        assert_eq!(ActionKind::Set.as_str(), "SET");
    }

    #[test]
    fn test_account_snapshot_roundtrip() {
        let account = Account::new(Uuid::new_v4(), "Steve".to_string(), Decimal::from(100));
        let snap = account.snapshot();
        assert_eq!(snap.name, "Steve");
        assert_eq!(snap.balance, Decimal::from(100));
        assert_eq!(snap.daily_income, Decimal::ZERO);

        let restored = Account::from_snapshot(snap.clone());
        assert_eq!(restored.snapshot(), snap);
        assert!(!restored.is_dirty());
    }

    #[test]
    fn test_mark_saved_keeps_newer_dirty_state() {
        let account = Account::new(Uuid::new_v4(), "Alex".to_string(), Decimal::ZERO);
        account.set_balance(Decimal::from(5));
        let saved_at = account.snapshot().updated_at;

        // A mutation after the snapshot keeps the flag
        {
            let mut st = account.lock();
            st.balance = Decimal::from(6);
            st.updated_at = saved_at + 1;
            st.dirty = true;
        }
        account.mark_saved(saved_at);
        assert!(account.is_dirty());

        account.mark_saved(saved_at + 1);
        assert!(!account.is_dirty());
    }

    #[test]
    fn test_rename_only_marks_dirty_on_change() {
        let account = Account::new(Uuid::new_v4(), "Alex".to_string(), Decimal::ZERO);
        account.rename("Alex".to_string());
        assert!(!account.is_dirty());
        account.rename("Alexis".to_string());
        assert!(account.is_dirty());
        assert_eq!(account.name(), "Alexis");
    }
}
