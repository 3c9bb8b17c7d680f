//! Coinrail Sync Bus
//!
//! Best-effort cross-node balance replication over Redis pub/sub. Every node
//! publishes its committed mutations on one shared channel and applies what
//! the others publish, skipping its own echoes. Last writer wins; the shared
//! store remains the source of truth on next load.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod config;
pub mod error;
pub mod message;
pub mod metrics;
pub mod publisher;
pub mod subscriber;

// Re-exports
pub use config::SyncConfig;
pub use error::{Error, Result};
pub use message::{SyncKind, SyncMessage};
pub use publisher::SyncPublisher;
pub use subscriber::SyncSubscriber;

use std::sync::Arc;

use economy_core::AccountCache;
use tokio::task::JoinHandle;

/// Wire replication for one node per its configuration
///
/// Connects the publisher and starts the subscriber loop. When
/// `cfg.enabled` is false nothing touches the broker and `None` is
/// returned; the engine then stays on its default no-op sync.
pub async fn start(
    cfg: SyncConfig,
    cache: Arc<AccountCache>,
) -> Result<Option<(SyncPublisher, JoinHandle<()>)>> {
    if !cfg.enabled {
        tracing::info!("cross-node sync disabled");
        return Ok(None);
    }
    let publisher = SyncPublisher::connect(&cfg).await?;
    let listener = SyncSubscriber::new(cfg, cache)?.spawn();
    Ok(Some((publisher, listener)))
}
