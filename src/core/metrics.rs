//! Metrics collection using Prometheus
//!
//! Tracks the download coordinator:
//! - Session lifecycle counters (created, completed, failed)
//! - Worker pool occupancy (active and queued transfers)
//! - Progress fan-out health (observers, dropped events, hand-off timeouts)

// Registration fails only on duplicate metric names
#![allow(clippy::unwrap_used)]

use lazy_static::lazy_static;
use prometheus::{register_counter_vec, register_gauge, CounterVec, Encoder, Gauge, TextEncoder};

lazy_static! {
    /// Sessions accepted by the registry
    /// Labels: kind (merged/single)
    pub static ref SESSIONS_CREATED_TOTAL: CounterVec = register_counter_vec!(
        "vidfetch_sessions_created_total",
        "Total number of download sessions created",
        &["kind"]
    )
    .unwrap();

    /// Sessions that reached a terminal state
    /// Labels: outcome (completed/failed)
    pub static ref SESSIONS_FINISHED_TOTAL: CounterVec = register_counter_vec!(
        "vidfetch_sessions_finished_total",
        "Total number of download sessions that reached a terminal state",
        &["outcome"]
    )
    .unwrap();

    /// Transfers currently holding a worker slot
    pub static ref ACTIVE_WORKERS: Gauge = register_gauge!(
        "vidfetch_active_workers",
        "Number of transfers currently running"
    )
    .unwrap();

    /// Transfers waiting for a worker slot
    pub static ref QUEUED_WORKERS: Gauge = register_gauge!(
        "vidfetch_queued_workers",
        "Number of transfers waiting for a free worker slot"
    )
    .unwrap();

    /// Connected progress observers
    pub static ref CONNECTED_OBSERVERS: Gauge = register_gauge!(
        "vidfetch_connected_observers",
        "Number of observers subscribed to the progress bus"
    )
    .unwrap();

    /// Events that did not reach an observer or the bus
    /// Labels: reason (observer_full/handoff_timeout/handoff_closed)
    pub static ref DROPPED_EVENTS_TOTAL: CounterVec = register_counter_vec!(
        "vidfetch_dropped_events_total",
        "Total number of progress events dropped",
        &["reason"]
    )
    .unwrap();
}

/// Record a newly created session
pub fn record_session_created(kind: &str) {
    SESSIONS_CREATED_TOTAL.with_label_values(&[kind]).inc();
}

/// Record a terminal transition ("completed" or "failed")
pub fn record_session_finished(outcome: &str) {
    SESSIONS_FINISHED_TOTAL.with_label_values(&[outcome]).inc();
}

/// Record an event dropped for the given reason
pub fn record_dropped_event(reason: &str) {
    DROPPED_EVENTS_TOTAL.with_label_values(&[reason]).inc();
}

/// Set the connected observer gauge
pub fn set_observer_count(count: usize) {
    CONNECTED_OBSERVERS.set(count as f64);
}

/// Render every registered metric in the Prometheus text format
pub fn render() -> Result<(String, Vec<u8>), prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&prometheus::gather(), &mut buffer)?;
    Ok((encoder.format_type().to_string(), buffer))
}
