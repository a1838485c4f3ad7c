//! # Reconciler
//!
//! Core reconciliation logic for `SqlCredential` resources.
//!
//! ## Reconciliation Flow
//!
//! 1. Fetch the resource; a missing resource is already deleted and settles
//! 2. Validate the spec (`revision >= 1`)
//! 3. Resolve the administrative URL from the master secret
//! 4. Ensure the managed secret for the declared revision, reusing its stored password
//! 5. Connect the backend and ensure the revision's database user
//! 6. Retire older revisions, oldest first, stopping at the first one still in use
//! 7. Record the retained revisions in status
//!
//! A pass is bounded by the configured deadline and never retries internally.
//! Retry timing belongs to the watch loop: [`reconcile`] maps outcomes to
//! [`Action`]s and the error policy applies per-resource backoff.

pub mod gc;
pub mod password;
pub mod secret;
pub mod status;
pub mod validation;

use crate::backend::{BackendError, BackendFactory, BackendUser, CredentialBackend};
use crate::config::ControllerConfig;
use crate::constants::PASSWORD_BYTES;
use crate::controller::backoff::FibonacciBackoff;
use crate::crd::{SqlCredential, SqlCredentialStatus};
use crate::observability::metrics;
use crate::store::{CredentialStore, ResourceKey, SecretStore, StoreError};
use gc::{GcError, GcReport};
use kube_runtime::controller::Action;
use password::PasswordError;
use secret::SecretError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, info_span, warn, Instrument};
use validation::ValidationError;

/// Result of a pass that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Nothing left to do until the resource changes
    Settled,
    /// An older revision is still in use; run again later
    Requeue,
}

#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error("invalid spec: {0}")]
    Validation(#[from] ValidationError),
    #[error("failed to read resource: {0}")]
    Store(#[source] StoreError),
    #[error("failed to resolve master secret {name}: {source}")]
    MasterSecret {
        name: String,
        #[source]
        source: SecretError,
    },
    #[error("failed to ensure managed secret: {0}")]
    Secret(#[source] SecretError),
    #[error(transparent)]
    Password(#[from] PasswordError),
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),
    #[error("garbage collection failed: {0}")]
    GarbageCollection(#[from] GcError),
    #[error("failed to update status: {0}")]
    Status(#[source] StoreError),
    #[error("reconciliation exceeded its {0:?} deadline")]
    Timeout(Duration),
}

impl ReconcilerError {
    /// Validation errors cannot heal without a spec edit
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Validation(_))
    }
}

/// Reconciler context shared by every pass
pub struct Reconciler {
    credentials: Arc<dyn CredentialStore>,
    secrets: Arc<dyn SecretStore>,
    backends: Arc<dyn BackendFactory>,
    config: ControllerConfig,
    /// Fibonacci backoff per resource, keyed by `namespace/name`
    backoff_states: Mutex<HashMap<String, FibonacciBackoff>>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    #[must_use]
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        secrets: Arc<dyn SecretStore>,
        backends: Arc<dyn BackendFactory>,
        config: ControllerConfig,
    ) -> Self {
        Self {
            credentials,
            secrets,
            backends,
            config,
            backoff_states: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Next retry delay for a failing resource; advances its backoff
    pub fn next_backoff(&self, key: &ResourceKey) -> Duration {
        match self.backoff_states.lock() {
            Ok(mut states) => states
                .entry(key.to_string())
                .or_insert_with(|| {
                    FibonacciBackoff::new(
                        self.config.backoff_min_minutes,
                        self.config.backoff_max_minutes,
                    )
                })
                .next_backoff(),
            Err(_) => {
                warn!(resource = %key, "backoff state poisoned, using minimum backoff");
                Duration::from_secs(self.config.backoff_min_minutes.max(1) * 60)
            }
        }
    }

    /// Restart the backoff of a resource after a successful pass
    pub fn reset_backoff(&self, key: &ResourceKey) {
        if let Ok(mut states) = self.backoff_states.lock() {
            if let Some(backoff) = states.get_mut(&key.to_string()) {
                backoff.reset();
            }
        }
    }

    /// Run one pass for `key` under the configured deadline
    ///
    /// # Errors
    ///
    /// Any failed step aborts the pass; see [`ReconcilerError`].
    pub async fn reconcile_key(
        &self,
        key: &ResourceKey,
    ) -> Result<ReconcileOutcome, ReconcilerError> {
        let start = Instant::now();
        let deadline = self.config.reconcile_timeout();
        metrics::increment_reconciliations();

        let result = tokio::time::timeout(deadline, self.reconcile_pass(key))
            .await
            .unwrap_or(Err(ReconcilerError::Timeout(deadline)));

        metrics::observe_reconciliation_duration(start.elapsed().as_secs_f64());
        if result.is_err() {
            metrics::increment_reconciliation_errors();
        }
        result
    }

    async fn reconcile_pass(&self, key: &ResourceKey) -> Result<ReconcileOutcome, ReconcilerError> {
        let Some(credential) = self
            .credentials
            .get(key)
            .await
            .map_err(ReconcilerError::Store)?
        else {
            info!(resource = %key, "SqlCredential not found, assuming it was deleted");
            return Ok(ReconcileOutcome::Settled);
        };

        let spec = &credential.spec;
        let span = info_span!(
            "reconcile",
            resource.namespace = %key.namespace,
            resource.name = %key.name,
            driver = %spec.driver,
            host = %spec.host,
            revision = spec.revision,
            user = %spec.user,
            role = %spec.role,
        );
        self.apply(key, &credential).instrument(span).await
    }

    async fn apply(
        &self,
        key: &ResourceKey,
        credential: &SqlCredential,
    ) -> Result<ReconcileOutcome, ReconcilerError> {
        let spec = &credential.spec;
        validation::validate_spec(spec)?;

        let master_url =
            secret::read_master_url(self.secrets.as_ref(), &key.namespace, &spec.master_secret)
                .await
                .map_err(|source| ReconcilerError::MasterSecret {
                    name: spec.master_secret.clone(),
                    source,
                })?;

        let candidate = password::generate_password(PASSWORD_BYTES)?;
        let ensured = secret::ensure_secret(self.secrets.as_ref(), credential, key, candidate)
            .await
            .map_err(ReconcilerError::Secret)?;
        if ensured.created {
            metrics::increment_secrets_created();
        }

        let backend = self.backends.connect(&spec.driver, &master_url).await?;
        let converged = self
            .converge_backend(backend.as_ref(), key, credential, ensured.password)
            .await;
        backend.close().await;
        let report = converged?;

        let desired = SqlCredentialStatus::retained(
            report.oldest_retained(spec.revision),
            spec.revision,
            credential.metadata.generation,
        );
        status::update_status(self.credentials.as_ref(), key, credential, &desired)
            .await
            .map_err(ReconcilerError::Status)?;

        match report.blocked_on {
            Some(revision) => {
                info!(blocked_on = revision, "older revision still has sessions, requeueing");
                Ok(ReconcileOutcome::Requeue)
            }
            None => {
                info!(retired = ?report.removed, "reconciliation settled");
                Ok(ReconcileOutcome::Settled)
            }
        }
    }

    async fn converge_backend(
        &self,
        backend: &dyn CredentialBackend,
        key: &ResourceKey,
        credential: &SqlCredential,
        password: String,
    ) -> Result<GcReport, ReconcilerError> {
        let spec = &credential.spec;
        let user = BackendUser {
            name: spec.current_user(),
            password,
            role: spec.role.clone(),
        };
        if backend.create_user(&user).await? {
            metrics::increment_backend_users_created();
        }

        Ok(gc::collect_garbage(self.secrets.as_ref(), backend, key, credential).await?)
    }
}

/// Reconcile entry point for the watch loop
///
/// # Errors
///
/// Returns the pass error; the error policy decides when to retry.
pub async fn reconcile(
    credential: Arc<SqlCredential>,
    ctx: Arc<Reconciler>,
) -> Result<Action, ReconcilerError> {
    let Some(key) = ResourceKey::from_resource(&credential) else {
        warn!("SqlCredential without name or namespace, ignoring");
        return Ok(Action::await_change());
    };

    let outcome = ctx.reconcile_key(&key).await?;
    ctx.reset_backoff(&key);

    Ok(match outcome {
        ReconcileOutcome::Settled => Action::await_change(),
        ReconcileOutcome::Requeue => {
            metrics::increment_requeues_total("sessions-active");
            Action::requeue(ctx.config.gc_requeue_interval())
        }
    })
}
