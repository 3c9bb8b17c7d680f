//! Coinrail Economy Core
//!
//! In-process economy ledger for a multiplayer game server cluster.
//!
//! # Architecture
//!
//! - **Write-back cache**: Hot account state lives in memory; a background
//!   actor persists dirty rows to the embedded store
//! - **Single store gate**: The embedded SQL engine is single-writer, so all
//!   store access flows through one reader/writer lock
//! - **Interceptors**: Balance mutations pass through a cancellable pre-commit
//!   hook chain before they are applied
//! - **Best-effort replication**: Committed mutations are broadcast to peer
//!   nodes over a pub/sub channel, last writer wins

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod hook;
pub mod leaderboard;
pub mod metrics;
pub mod money;
pub mod named;
pub mod stats;
pub mod store;
pub mod sync;
pub mod types;
pub mod writer;

// Re-exports
pub use cache::AccountCache;
pub use config::Config;
pub use engine::{EconomyEngine, OpError, OpResult};
pub use error::{Error, Result};
pub use money::MoneyContext;
pub use store::AccountStore;
pub use types::{Account, AccountSnapshot, ActionKind, ChangeReason};
