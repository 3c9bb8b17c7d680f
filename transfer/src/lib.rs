//! Coinrail Transfer Protocol
//!
//! Two-leg transfers between identities: tax assessment, a cancellable
//! transfer hook, withdraw then deposit with a compensating deposit when the
//! second leg fails, immutable transfer records, and offline tips for
//! receivers who are not resident. Also hosts the inbound API facade that
//! bundles the engine, protocol, leaderboard, and stats.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod api;
pub mod config;
pub mod error;
pub mod protocol;
pub mod tax;
pub mod tips;

// Re-exports
pub use api::EconomyApi;
pub use config::TransferConfig;
pub use error::{Error, Result};
pub use protocol::{TransferOutcome, TransferProtocol};
pub use tax::TaxPolicy;
