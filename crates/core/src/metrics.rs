//! Prometheus metrics for core components.
//!
//! Statics are created unregistered; the server registers them into its
//! registry alongside its own metrics.

use once_cell::sync::Lazy;
use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry};

// =============================================================================
// Reservation Metrics
// =============================================================================

/// Reserve call outcomes.
pub static RESERVE_ATTEMPTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "boxoffice_reserve_attempts_total",
            "Total reserve calls against the booking service",
        ),
        &["result"], // "accepted", "inventory_unavailable", "transient", "protocol"
    )
    .unwrap()
});

/// Duration of the reserve call.
pub static RESERVE_DURATION: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "boxoffice_reserve_duration_seconds",
            "Duration of the reserve call",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
    )
    .unwrap()
});

/// Terminal phases reached.
pub static RESERVATIONS_TERMINAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "boxoffice_reservations_terminal_total",
            "Reservations reaching a terminal phase",
        ),
        &["phase"], // "completed", "failed", "expired"
    )
    .unwrap()
});

/// Retries requested from a terminal phase.
pub static RESERVATION_RETRIES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "boxoffice_reservation_retries_total",
        "Retry attempts from Failed or Expired",
    )
    .unwrap()
});

// =============================================================================
// Status Channel Metrics
// =============================================================================

/// Status events applied by the coordinator, by status.
pub static STATUS_EVENTS_APPLIED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "boxoffice_status_events_applied_total",
            "Status events that caused a phase transition",
        ),
        &["status"],
    )
    .unwrap()
});

/// Duplicate status events dropped by the dedup cache.
pub static STATUS_EVENTS_DEDUPED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "boxoffice_status_events_deduped_total",
        "Duplicate status events dropped",
    )
    .unwrap()
});

/// Channel connect/transport/parse errors (all non-fatal).
pub static STATUS_CHANNEL_ERRORS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "boxoffice_status_channel_errors_total",
        "Status channel errors (never fatal for the reservation)",
    )
    .unwrap()
});

/// Signals discarded because they belonged to a stale attempt or a phase
/// already left.
pub static STALE_SIGNALS_DROPPED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "boxoffice_stale_signals_dropped_total",
        "Timer/channel signals discarded by the phase guard",
    )
    .unwrap()
});

/// Register all core metrics into the given registry.
pub fn register_core_metrics(registry: &Registry) {
    registry
        .register(Box::new(RESERVE_ATTEMPTS.clone()))
        .unwrap();
    registry
        .register(Box::new(RESERVE_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(RESERVATIONS_TERMINAL.clone()))
        .unwrap();
    registry
        .register(Box::new(RESERVATION_RETRIES.clone()))
        .unwrap();
    registry
        .register(Box::new(STATUS_EVENTS_APPLIED.clone()))
        .unwrap();
    registry
        .register(Box::new(STATUS_EVENTS_DEDUPED.clone()))
        .unwrap();
    registry
        .register(Box::new(STATUS_CHANNEL_ERRORS.clone()))
        .unwrap();
    registry
        .register(Box::new(STALE_SIGNALS_DROPPED.clone()))
        .unwrap();
}
