use std::net::SocketAddr;

use crate::engine::BookingError;

// ── Domain counters ─────────────────────────────────────────────

/// Counter: hold attempts. Labels: outcome (`created` or a rejection label).
pub const HOLDS_TOTAL: &str = "roomhold_holds_total";

/// Counter: reservations cancelled.
pub const CANCELLATIONS_TOTAL: &str = "roomhold_cancellations_total";

/// Counter: reservations deleted.
pub const DELETIONS_TOTAL: &str = "roomhold_deletions_total";

/// Counter: calendar override writes and removals.
pub const OVERRIDE_WRITES_TOTAL: &str = "roomhold_override_writes_total";

/// Counter: pending holds failed by the reaper after their TTL.
pub const STALE_HOLDS_REAPED_TOTAL: &str = "roomhold_stale_holds_reaped_total";

// ── Storage ─────────────────────────────────────────────────────

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "roomhold_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "roomhold_wal_flush_batch_size";

/// Counter: WAL compactions performed.
pub const WAL_COMPACTIONS_TOTAL: &str = "roomhold_wal_compactions_total";

/// Install the fmt tracing subscriber and, when a port is given, the
/// Prometheus exporter. Safe to call more than once; later calls only log.
pub fn init(metrics_port: Option<u16>) {
    // Fails only when a global subscriber is already set.
    let _ = tracing_subscriber::fmt().try_init();

    let Some(port) = metrics_port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    match metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
    {
        Ok(()) => tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics"),
        Err(e) => tracing::error!("failed to install Prometheus exporter on {addr}: {e}"),
    }
}

/// Map an error to a short label for the `outcome` metric label.
pub fn rejection_label(err: &BookingError) -> &'static str {
    match err {
        BookingError::InvalidInput(_) => "invalid_input",
        BookingError::InvalidDateRange => "invalid_date_range",
        BookingError::PrivateEventOnly { .. } => "private_event_only",
        BookingError::RoomUnavailable { .. } => "room_unavailable",
        BookingError::InsufficientCapacity { .. } => "insufficient_capacity",
        BookingError::InvalidTotal(_) => "invalid_total",
        BookingError::NotFound(_) => "not_found",
        BookingError::InvalidTransition { .. } => "invalid_transition",
        BookingError::LimitExceeded(_) => "limit_exceeded",
        BookingError::Persistence(_) => "persistence",
    }
}
