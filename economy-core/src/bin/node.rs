//! Standalone economy node binary

use economy_core::cache::AccountCache;
use economy_core::config::Config;
use economy_core::engine::EconomyEngine;
use economy_core::hook::InterceptorRegistry;
use economy_core::metrics::Metrics;
use economy_core::money::MoneyContext;
use economy_core::store::AccountStore;
use economy_core::writer::spawn_writer;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting Coinrail economy node");

    let config = Config::from_env()?;
    let store = Arc::new(AccountStore::open(&config.store).await?);
    let metrics = Arc::new(Metrics::new()?);
    let writer = spawn_writer(store.clone(), Duration::from_secs(30), metrics.clone());
    let money = Arc::new(MoneyContext::new(&config.currency));
    let cache = Arc::new(AccountCache::new(
        store.clone(),
        writer.clone(),
        money,
        config.cache.clone(),
        config.currency.starting_balance,
        metrics.clone(),
    ));
    let engine = Arc::new(EconomyEngine::new(
        cache.clone(),
        Arc::new(InterceptorRegistry::new()),
        config.logging.clone(),
        metrics,
    ));
    tracing::info!("Economy engine ready");

    // Hourly housekeeping: day-boundary sweep and retention cleanup
    {
        let cache = cache.clone();
        let store = store.clone();
        let retention_days = config.store.retention_days;
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(Duration::from_secs(3_600));
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tick.tick().await;
                cache.check_daily_reset();
                if let Err(e) = store.cleanup(retention_days).await {
                    tracing::warn!("retention cleanup failed: {}", e);
                }
            }
        });
    }

    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down economy node");
    let _ = engine.cache().flush_all().await;
    writer.shutdown().await?;
    Ok(())
}
