//! # Metrics
//!
//! Prometheus metrics for monitoring reconciliation passes.
//!
//! ## Metrics Exposed
//!
//! - `roster_sync_passes_total` - Total number of passes by outcome
//! - `roster_sync_pass_errors_total` - Errors counted across all passes
//! - `roster_sync_pass_duration_seconds` - Duration of a full pass
//! - `roster_sync_users_created_total` - Users enrolled on devices
//! - `roster_sync_users_updated_total` - Users modified on devices
//! - `roster_sync_users_deleted_total` - Users removed from devices
//! - `roster_sync_operation_failures_total` - Failed operations by kind
//! - `roster_sync_device_requests_total` - ISAPI requests by operation and result
//! - `roster_sync_device_request_duration_seconds` - Duration of ISAPI requests
//! - `roster_sync_malformed_records_total` - Records rejected by the normalizer by origin
//! - `roster_sync_triggers_coalesced_total` - Triggers folded into a pending pass
//! - `roster_sync_last_pass_timestamp_seconds` - Unix time the last pass finished
//! - `roster_sync_last_pass_errors` - Error count of the last pass
//! - `roster_sync_roster_users` - Users in the last roster snapshot
//! - `roster_sync_device_users` - Users in the last device snapshot

use anyhow::Result;
use prometheus::{Histogram, HistogramVec, IntCounter, IntCounterVec, IntGauge, Registry};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static REGISTERED: AtomicBool = AtomicBool::new(false);

static PASSES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new("roster_sync_passes_total", "Total number of reconciliation passes"),
        &["outcome"],
    )
    .expect("Failed to create PASSES_TOTAL metric - this should never happen")
});

static PASS_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "roster_sync_pass_errors_total",
        "Total number of errors counted across reconciliation passes",
    )
    .expect("Failed to create PASS_ERRORS_TOTAL metric - this should never happen")
});

static PASS_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "roster_sync_pass_duration_seconds",
            "Duration of a reconciliation pass in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]),
    )
    .expect("Failed to create PASS_DURATION metric - this should never happen")
});

static USERS_CREATED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "roster_sync_users_created_total",
        "Total number of users enrolled on devices",
    )
    .expect("Failed to create USERS_CREATED_TOTAL metric - this should never happen")
});

static USERS_UPDATED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "roster_sync_users_updated_total",
        "Total number of users modified on devices",
    )
    .expect("Failed to create USERS_UPDATED_TOTAL metric - this should never happen")
});

static USERS_DELETED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "roster_sync_users_deleted_total",
        "Total number of users removed from devices",
    )
    .expect("Failed to create USERS_DELETED_TOTAL metric - this should never happen")
});

static OPERATION_FAILURES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "roster_sync_operation_failures_total",
            "Total number of operations that failed on every target device",
        ),
        &["operation"],
    )
    .expect("Failed to create OPERATION_FAILURES_TOTAL metric - this should never happen")
});

static DEVICE_REQUESTS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "roster_sync_device_requests_total",
            "Total number of device requests by operation and result",
        ),
        &["operation", "result"],
    )
    .expect("Failed to create DEVICE_REQUESTS_TOTAL metric - this should never happen")
});

static DEVICE_REQUEST_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "roster_sync_device_request_duration_seconds",
            "Duration of device requests in seconds by operation",
        )
        .buckets(vec![0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
        &["operation"],
    )
    .expect("Failed to create DEVICE_REQUEST_DURATION metric - this should never happen")
});

static MALFORMED_RECORDS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "roster_sync_malformed_records_total",
            "Total number of records rejected by the normalizer",
        ),
        &["origin"],
    )
    .expect("Failed to create MALFORMED_RECORDS_TOTAL metric - this should never happen")
});

static TRIGGERS_COALESCED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "roster_sync_triggers_coalesced_total",
        "Total number of triggers folded into an already pending pass",
    )
    .expect("Failed to create TRIGGERS_COALESCED_TOTAL metric - this should never happen")
});

static LAST_PASS_TIMESTAMP: LazyLock<IntGauge> = LazyLock::new(|| {
    IntGauge::new(
        "roster_sync_last_pass_timestamp_seconds",
        "Unix timestamp of the last finished pass",
    )
    .expect("Failed to create LAST_PASS_TIMESTAMP metric - this should never happen")
});

static LAST_PASS_ERRORS: LazyLock<IntGauge> = LazyLock::new(|| {
    IntGauge::new("roster_sync_last_pass_errors", "Error count of the last pass")
        .expect("Failed to create LAST_PASS_ERRORS metric - this should never happen")
});

static ROSTER_USERS: LazyLock<IntGauge> = LazyLock::new(|| {
    IntGauge::new("roster_sync_roster_users", "Users in the last roster snapshot")
        .expect("Failed to create ROSTER_USERS metric - this should never happen")
});

static DEVICE_USERS: LazyLock<IntGauge> = LazyLock::new(|| {
    IntGauge::new("roster_sync_device_users", "Users in the last device snapshot")
        .expect("Failed to create DEVICE_USERS metric - this should never happen")
});

/// Register every metric with [`REGISTRY`]. Later calls are no-ops.
#[allow(
    clippy::missing_errors_doc,
    reason = "Error documentation is provided in doc comments"
)]
pub fn register_metrics() -> Result<()> {
    if REGISTERED.swap(true, Ordering::SeqCst) {
        return Ok(());
    }
    REGISTRY.register(Box::new(PASSES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(PASS_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(PASS_DURATION.clone()))?;
    REGISTRY.register(Box::new(USERS_CREATED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(USERS_UPDATED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(USERS_DELETED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(OPERATION_FAILURES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(DEVICE_REQUESTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(DEVICE_REQUEST_DURATION.clone()))?;
    REGISTRY.register(Box::new(MALFORMED_RECORDS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(TRIGGERS_COALESCED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(LAST_PASS_TIMESTAMP.clone()))?;
    REGISTRY.register(Box::new(LAST_PASS_ERRORS.clone()))?;
    REGISTRY.register(Box::new(ROSTER_USERS.clone()))?;
    REGISTRY.register(Box::new(DEVICE_USERS.clone()))?;
    Ok(())
}

pub fn increment_passes(outcome: &str) {
    PASSES_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn increment_pass_errors(count: u64) {
    PASS_ERRORS_TOTAL.inc_by(count);
}

pub fn observe_pass_duration(duration: f64) {
    PASS_DURATION.observe(duration);
}

pub fn increment_users_created(count: u64) {
    USERS_CREATED_TOTAL.inc_by(count);
}

pub fn increment_users_updated(count: u64) {
    USERS_UPDATED_TOTAL.inc_by(count);
}

pub fn increment_users_deleted(count: u64) {
    USERS_DELETED_TOTAL.inc_by(count);
}

pub fn increment_operation_failures(operation: &str) {
    OPERATION_FAILURES_TOTAL.with_label_values(&[operation]).inc();
}

/// Record one device request with its outcome and duration
pub fn record_device_request(operation: &str, success: bool, duration: f64) {
    let result = if success { "success" } else { "error" };
    DEVICE_REQUESTS_TOTAL
        .with_label_values(&[operation, result])
        .inc();
    DEVICE_REQUEST_DURATION
        .with_label_values(&[operation])
        .observe(duration);
}

pub fn increment_malformed_records(origin: &str, count: u64) {
    MALFORMED_RECORDS_TOTAL
        .with_label_values(&[origin])
        .inc_by(count);
}

pub fn increment_triggers_coalesced() {
    TRIGGERS_COALESCED_TOTAL.inc();
}

pub fn set_last_pass(timestamp: i64, errors: u64) {
    LAST_PASS_TIMESTAMP.set(timestamp);
    LAST_PASS_ERRORS.set(i64::try_from(errors).unwrap_or(i64::MAX));
}

pub fn set_snapshot_sizes(roster: usize, device: usize) {
    ROSTER_USERS.set(i64::try_from(roster).unwrap_or(i64::MAX));
    DEVICE_USERS.set(i64::try_from(device).unwrap_or(i64::MAX));
}
