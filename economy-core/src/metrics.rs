//! Metrics collection for observability
//!
//! # Metrics
//!
//! - `economy_operations_total` - Balance mutations by action and status
//! - `economy_cache_hits_total` / `economy_cache_misses_total` - Account cache
//! - `economy_accounts_provisioned_total` - Auto-provisioned accounts
//! - `economy_store_write_failures_total` - Store writes that entered retry
//! - `economy_operation_duration_seconds` - Mutation latency

use prometheus::{
    Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry,
};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Balance mutations by action and status
    pub operations_total: IntCounterVec,

    /// Account cache hits
    pub cache_hits: IntCounter,

    /// Account cache misses
    pub cache_misses: IntCounter,

    /// Auto-provisioned accounts
    pub accounts_provisioned: IntCounter,

    /// Store writes that entered the retry queue
    pub store_write_failures: IntCounter,

    /// Mutation latency
    pub operation_duration: Histogram,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create a new metrics collector with its own registry
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let operations_total = IntCounterVec::new(
            Opts::new("economy_operations_total", "Balance mutations by action and status"),
            &["action", "status"],
        )?;
        registry.register(Box::new(operations_total.clone()))?;

        let cache_hits = IntCounter::with_opts(Opts::new(
            "economy_cache_hits_total",
            "Account cache hits",
        ))?;
        registry.register(Box::new(cache_hits.clone()))?;

        let cache_misses = IntCounter::with_opts(Opts::new(
            "economy_cache_misses_total",
            "Account cache misses",
        ))?;
        registry.register(Box::new(cache_misses.clone()))?;

        let accounts_provisioned = IntCounter::with_opts(Opts::new(
            "economy_accounts_provisioned_total",
            "Auto-provisioned accounts",
        ))?;
        registry.register(Box::new(accounts_provisioned.clone()))?;

        let store_write_failures = IntCounter::with_opts(Opts::new(
            "economy_store_write_failures_total",
            "Store writes that entered the retry queue",
        ))?;
        registry.register(Box::new(store_write_failures.clone()))?;

        let operation_duration = Histogram::with_opts(
            HistogramOpts::new(
                "economy_operation_duration_seconds",
                "Mutation latency in seconds",
            )
            .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.010, 0.050, 0.100, 0.500]),
        )?;
        registry.register(Box::new(operation_duration.clone()))?;

        Ok(Self {
            operations_total,
            cache_hits,
            cache_misses,
            accounts_provisioned,
            store_write_failures,
            operation_duration,
            registry,
        })
    }

    /// Record a completed mutation
    pub fn record_operation(&self, action: &str, status: &str) {
        self.operations_total.with_label_values(&[action, status]).inc();
    }

    /// Record a cache hit
    pub fn record_cache_hit(&self) {
        self.cache_hits.inc();
    }

    /// Record a cache miss
    pub fn record_cache_miss(&self) {
        self.cache_misses.inc();
    }

    /// Record an auto-provisioned account
    pub fn record_provision(&self) {
        self.accounts_provisioned.inc();
    }

    /// Record a store write that entered the retry queue
    pub fn record_write_failure(&self) {
        self.store_write_failures.inc();
    }

    /// Record mutation latency
    pub fn record_operation_duration(&self, seconds: f64) {
        self.operation_duration.observe(seconds);
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new().expect("Failed to create metrics")
    }
}
