//! # Metrics
//!
//! Prometheus metrics for monitoring the controller.
//!
//! ## Metrics Exposed
//!
//! - `sql_credential_reconciliations_total` - Total number of reconciliation passes
//! - `sql_credential_reconciliation_errors_total` - Total number of failed passes
//! - `sql_credential_reconciliation_duration_seconds` - Duration of reconciliation passes
//! - `sql_credential_requeues_total` - Requeues by reason
//! - `sql_credential_backend_users_created_total` - Database users created
//! - `sql_credential_backend_users_removed_total` - Database users retired
//! - `sql_credential_secrets_created_total` - Managed secrets created
//! - `sql_credential_secrets_deleted_total` - Managed secrets deleted

use anyhow::Result;
use prometheus::{Histogram, IntCounter, IntCounterVec, Registry};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "sql_credential_reconciliations_total",
        "Total number of reconciliation passes",
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "sql_credential_reconciliation_errors_total",
        "Total number of failed reconciliation passes",
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "sql_credential_reconciliation_duration_seconds",
            "Duration of reconciliation passes in seconds",
        )
        .buckets(vec![0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]),
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static REQUEUES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "sql_credential_requeues_total",
            "Total number of requeues by reason",
        ),
        &["reason"],
    )
    .expect("Failed to create REQUEUES_TOTAL metric - this should never happen")
});

static BACKEND_USERS_CREATED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "sql_credential_backend_users_created_total",
        "Total number of database users created for a current revision",
    )
    .expect("Failed to create BACKEND_USERS_CREATED_TOTAL metric - this should never happen")
});

static BACKEND_USERS_REMOVED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "sql_credential_backend_users_removed_total",
        "Total number of database users dropped for retired revisions",
    )
    .expect("Failed to create BACKEND_USERS_REMOVED_TOTAL metric - this should never happen")
});

static SECRETS_CREATED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "sql_credential_secrets_created_total",
        "Total number of managed secrets created",
    )
    .expect("Failed to create SECRETS_CREATED_TOTAL metric - this should never happen")
});

static SECRETS_DELETED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "sql_credential_secrets_deleted_total",
        "Total number of managed secrets deleted for retired revisions",
    )
    .expect("Failed to create SECRETS_DELETED_TOTAL metric - this should never happen")
});

/// Register all metrics with the registry
///
/// # Errors
///
/// Fails if called twice: the registry rejects duplicate collectors.
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(REQUEUES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(BACKEND_USERS_CREATED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(BACKEND_USERS_REMOVED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(SECRETS_CREATED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(SECRETS_DELETED_TOTAL.clone()))?;
    Ok(())
}

pub fn increment_reconciliations() {
    RECONCILIATIONS_TOTAL.inc();
}

pub fn increment_reconciliation_errors() {
    RECONCILIATION_ERRORS_TOTAL.inc();
}

pub fn observe_reconciliation_duration(duration: f64) {
    RECONCILIATION_DURATION.observe(duration);
}

/// Reasons: `sessions-active`, `error-backoff`
pub fn increment_requeues_total(reason: &str) {
    REQUEUES_TOTAL.with_label_values(&[reason]).inc();
}

pub fn increment_backend_users_created() {
    BACKEND_USERS_CREATED_TOTAL.inc();
}

pub fn increment_backend_users_removed() {
    BACKEND_USERS_REMOVED_TOTAL.inc();
}

pub fn increment_secrets_created() {
    SECRETS_CREATED_TOTAL.inc();
}

pub fn increment_secrets_deleted() {
    SECRETS_DELETED_TOTAL.inc();
}

/// Render the registry in the Prometheus text format
///
/// # Errors
///
/// Fails if encoding fails.
pub fn gather_text() -> Result<String> {
    let encoder = prometheus::TextEncoder::new();
    Ok(encoder.encode_to_string(&REGISTRY.gather())?)
}
