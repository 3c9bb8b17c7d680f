//! Seam between the core and the replication channel
//!
//! The engine and cache publish through this trait so the core never depends
//! on a transport crate. Publishing is fire and forget: implementations must
//! not block the caller and must swallow transport failures.

use rust_decimal::Decimal;
use uuid::Uuid;

/// Outbound replication channel
pub trait BalanceSync: Send + Sync {
    /// Announce a committed balance to peer nodes
    fn publish_balance(&self, identity: Uuid, name: &str, balance: Decimal);

    /// Announce a daily-income reset to peer nodes
    fn publish_income_reset(&self, identity: Uuid);
}

/// No-op channel for single-node deployments and tests
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSync;

impl BalanceSync for NullSync {
    fn publish_balance(&self, _identity: Uuid, _name: &str, _balance: Decimal) {}

    fn publish_income_reset(&self, _identity: Uuid) {}
}
