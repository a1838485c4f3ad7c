//! # Error Policy
//!
//! Retry decisions for failed reconciliations.
//!
//! Validation errors wait for the next spec change. Everything else is
//! retried with per-resource Fibonacci backoff, reset by the next successful
//! pass.

use crate::controller::reconciler::{Reconciler, ReconcilerError};
use crate::crd::SqlCredential;
use crate::observability::metrics;
use crate::store::ResourceKey;
use kube_runtime::controller::Action;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Handle reconciliation errors with Fibonacci backoff
pub fn handle_reconciliation_error(
    obj: Arc<SqlCredential>,
    error: &ReconcilerError,
    ctx: Arc<Reconciler>,
) -> Action {
    let name = obj.metadata.name.as_deref().unwrap_or("unknown");
    let namespace = obj.metadata.namespace.as_deref().unwrap_or("default");
    let spec = &obj.spec;

    let error_span = tracing::span!(
        tracing::Level::ERROR,
        "controller.watch.reconciliation_error",
        resource.name = name,
        resource.namespace = namespace,
        driver = %spec.driver,
        host = %spec.host,
        revision = spec.revision,
        user = %spec.user,
        role = %spec.role,
        error = %error
    );
    let _error_guard = error_span.enter();

    if !error.is_retryable() {
        warn!(
            "Reconciliation of {}/{} cannot succeed until the spec changes: {}",
            namespace, name, error
        );
        return Action::await_change();
    }

    error!("Reconciliation error for {}/{}: {}", namespace, name, error);

    let Some(key) = ResourceKey::from_resource(&obj) else {
        return Action::await_change();
    };
    let delay = ctx.next_backoff(&key);
    let next_attempt = chrono::Utc::now()
        + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
    info!(
        "Retrying {} in {}s (next attempt at {})",
        key,
        delay.as_secs(),
        next_attempt.to_rfc3339()
    );

    metrics::increment_requeues_total("error-backoff");
    Action::requeue(delay)
}
