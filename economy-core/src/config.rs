//! Configuration for the economy core

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use crate::money::RoundingPolicy;

/// Economy configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Currency rules (precision, rounding, ceiling)
    pub currency: CurrencyConfig,

    /// Embedded store configuration
    pub store: StoreConfig,

    /// Account cache configuration
    pub cache: CacheConfig,

    /// Leaderboard configuration
    pub leaderboard: LeaderboardConfig,

    /// Global stats configuration
    pub stats: StatsConfig,

    /// Audit logging configuration
    pub logging: LoggingConfig,
}

/// Currency rules
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrencyConfig {
    /// Fractional digits kept on every amount
    pub decimal_places: u32,

    /// Rounding policy applied when clamping precision
    pub rounding: RoundingPolicy,

    /// Maximum balance any account may hold
    pub max_balance: Decimal,

    /// Force whole-number balances (overrides decimal_places)
    pub integer_balance: bool,

    /// Balance granted when an account is auto-provisioned
    pub starting_balance: Decimal,
}

impl Default for CurrencyConfig {
    fn default() -> Self {
        Self {
            decimal_places: 2,
            rounding: RoundingPolicy::Down,
            max_balance: Decimal::from(10_000_000_000_000_000i64), // 1e16
            integer_balance: false,
            starting_balance: Decimal::ZERO,
        }
    }
}

/// Embedded store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Database file path
    pub path: PathBuf,

    /// Connection pool size
    pub max_connections: u32,

    /// Per-query timeout (milliseconds)
    pub query_timeout_ms: u64,

    /// Days to keep log/transaction/tip rows
    pub retention_days: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/economy.db"),
            max_connections: 4,
            query_timeout_ms: 3_000,
            retention_days: 30,
        }
    }
}

/// Account cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Route every call straight to the store (debugging aid)
    pub disable_cache: bool,

    /// Case-insensitive display-name index
    pub name_index_ignore_case: bool,

    /// Bound on a single account load (milliseconds)
    pub load_timeout_ms: u64,

    /// Fixed UTC offset (hours) for the daily-income day boundary
    pub utc_offset_hours: i32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            disable_cache: false,
            name_index_ignore_case: false,
            load_timeout_ms: 3_000,
            utc_offset_hours: 0,
        }
    }
}

/// Leaderboard configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardConfig {
    /// Entries shown per page
    pub per_page: usize,

    /// Entries kept in each ranked snapshot
    pub size: usize,

    /// Rebuild interval (seconds)
    pub refresh_seconds: u64,

    /// Accounts hidden from the rankings
    pub blacklist: BlacklistConfig,
}

impl Default for LeaderboardConfig {
    fn default() -> Self {
        Self {
            per_page: 10,
            size: 100,
            refresh_seconds: 60,
            blacklist: BlacklistConfig::default(),
        }
    }
}

/// Leaderboard blacklist
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BlacklistConfig {
    /// Enable filtering
    pub enabled: bool,

    /// Display names to hide (matched case-insensitively)
    pub names: Vec<String>,

    /// Identities to hide
    pub identities: Vec<Uuid>,
}

/// Global stats configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsConfig {
    /// Staleness interval before a lazy refresh (seconds)
    pub refresh_seconds: u64,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self { refresh_seconds: 60 }
    }
}

/// Audit logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Record admin deposit/withdraw/set mutations
    pub log_admin: bool,

    /// Record transfer legs
    pub log_transfers: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_admin: true,
            log_transfers: true,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(path) = std::env::var("ECONOMY_DB_PATH") {
            config.store.path = PathBuf::from(path);
        }

        if let Ok(timeout) = std::env::var("ECONOMY_QUERY_TIMEOUT_MS") {
            config.store.query_timeout_ms = timeout
                .parse()
                .map_err(|e| crate::Error::Config(format!("Bad query timeout: {}", e)))?;
        }

        if let Ok(disable) = std::env::var("ECONOMY_DISABLE_CACHE") {
            config.cache.disable_cache = disable == "1" || disable.eq_ignore_ascii_case("true");
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.currency.decimal_places, 2);
        assert_eq!(config.leaderboard.per_page, 10);
        assert!(!config.cache.disable_cache);
        assert!(config.logging.log_admin);
    }

    #[test]
    fn test_roundtrip_toml() {
        let config = Config::default();
        let text = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.store.retention_days, config.store.retention_days);
        assert_eq!(parsed.currency.max_balance, config.currency.max_balance);
    }
}
