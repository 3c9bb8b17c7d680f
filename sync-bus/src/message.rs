//! Sync message envelope

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What a sync message announces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncKind {
    /// A balance committed on the origin node
    BalanceUpdate,
    /// The origin node reset an account's daily income
    DailyIncomeReset,
}

/// Envelope broadcast on the shared channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncMessage {
    /// Announcement kind
    #[serde(rename = "type")]
    pub kind: SyncKind,

    /// Node that committed the mutation
    pub origin: String,

    /// Affected identity
    pub identity: Uuid,

    /// Display name, for balance updates
    pub name: Option<String>,

    /// Committed balance, for balance updates
    pub balance: Option<Decimal>,

    /// When the origin committed
    pub timestamp: DateTime<Utc>,
}

impl SyncMessage {
    /// Balance announcement
    pub fn balance_update(origin: &str, identity: Uuid, name: &str, balance: Decimal) -> Self {
        Self {
            kind: SyncKind::BalanceUpdate,
            origin: origin.to_string(),
            identity,
            name: Some(name.to_string()),
            balance: Some(balance),
            timestamp: Utc::now(),
        }
    }

    /// Daily-income reset announcement
    pub fn income_reset(origin: &str, identity: Uuid) -> Self {
        Self {
            kind: SyncKind::DailyIncomeReset,
            origin: origin.to_string(),
            identity,
            name: None,
            balance: None,
            timestamp: Utc::now(),
        }
    }

    /// Serialize to bytes
    pub fn to_bytes(&self) -> crate::Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Deserialize from bytes
    pub fn from_bytes(bytes: &[u8]) -> crate::Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
