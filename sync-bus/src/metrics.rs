//! Prometheus metrics for the sync bus

use lazy_static::lazy_static;
use prometheus::{register_counter_vec, CounterVec};

lazy_static! {
    /// Total sync messages published
    pub static ref SYNC_PUBLISH_TOTAL: CounterVec = register_counter_vec!(
        "sync_bus_publish_total",
        "Total sync messages published",
        &["kind", "status"]
    )
    .unwrap();

    /// Total sync messages received
    pub static ref SYNC_RECEIVE_TOTAL: CounterVec = register_counter_vec!(
        "sync_bus_receive_total",
        "Total sync messages received",
        &["kind", "status"]
    )
    .unwrap();

    /// Broker connection transitions
    pub static ref SYNC_CONNECTION_STATUS: CounterVec = register_counter_vec!(
        "sync_bus_connection_status",
        "Broker connection status transitions",
        &["status"]
    )
    .unwrap();
}
