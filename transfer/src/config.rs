//! Configuration for the transfer protocol

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Transfer protocol configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Smallest transferable amount
    pub min_amount: Decimal,

    /// Largest transferable amount
    pub max_amount: Decimal,

    /// Tax rules
    pub tax: TaxConfig,

    /// Record a tip when the receiver is not resident
    pub offline_tips: bool,

    /// Append a transfer record per completed transfer
    pub record_transactions: bool,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            min_amount: Decimal::ONE,
            max_amount: Decimal::from(1_000_000),
            tax: TaxConfig::default(),
            offline_tips: true,
            record_transactions: true,
        }
    }
}

/// Tax rules
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxConfig {
    /// Charge tax at all
    pub enabled: bool,

    /// Percentage of the transferred amount
    pub rate: Decimal,

    /// Identity credited with collected tax; destroyed when unset
    pub receiver: Option<Uuid>,

    /// Identities that never pay tax
    pub exempt: Vec<Uuid>,
}

impl Default for TaxConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rate: Decimal::from(5),
            receiver: None,
            exempt: Vec::new(),
        }
    }
}

impl TransferConfig {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Config(format!("Failed to read config: {}", e)))?;
        let config: TransferConfig = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }
}
