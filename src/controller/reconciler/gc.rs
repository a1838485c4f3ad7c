//! # Revision Garbage Collection
//!
//! Retires every revision older than the declared one, oldest first. A
//! revision whose user still has an open session stops the walk: neither it
//! nor anything newer is touched until a later pass finds it idle.
//!
//! Only secrets marked as belonging to the resource are deleted. A foreign
//! secret that happens to share a revision's name is left in place.

use super::secret::managed_secret_name;
use crate::backend::{BackendError, CredentialBackend};
use crate::crd::SqlCredential;
use crate::observability::metrics;
use crate::store::{ResourceKey, SecretStore, StoreError};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum GcError {
    #[error("failed to retire secret {secret}: {source}")]
    Secret {
        secret: String,
        #[source]
        source: StoreError,
    },
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Outcome of one collection walk
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GcReport {
    /// Revisions retired during this walk, ascending
    pub removed: Vec<i64>,
    /// First revision found with an open session, if any
    pub blocked_on: Option<i64>,
}

impl GcReport {
    /// Oldest revision still retained after the walk
    #[must_use]
    pub fn oldest_retained(&self, current: i64) -> i64 {
        self.blocked_on.unwrap_or(current)
    }
}

/// Walk revisions `1..spec.revision` of `credential`
///
/// # Errors
///
/// Aborts on the first failed lookup or deletion; revisions already retired
/// stay retired.
pub async fn collect_garbage(
    secrets: &dyn SecretStore,
    backend: &dyn CredentialBackend,
    key: &ResourceKey,
    credential: &SqlCredential,
) -> Result<GcReport, GcError> {
    let spec = &credential.spec;
    let uid = credential.metadata.uid.as_deref();
    let mut report = GcReport::default();

    for revision in 1..spec.revision {
        let user = spec.user_for_revision(revision);
        if backend.is_active(&user).await? {
            info!(revision, user = %user, "older revision still in use, deferring cleanup");
            report.blocked_on = Some(revision);
            return Ok(report);
        }

        let secret = managed_secret_name(&key.name, revision);
        let secret_error = |source: StoreError| GcError::Secret {
            secret: secret.clone(),
            source,
        };
        let deleted = match secrets
            .get(&key.namespace, &secret)
            .await
            .map_err(secret_error)?
        {
            Some(record) if record.is_managed_by(key, uid) => secrets
                .delete(&key.namespace, &secret)
                .await
                .map_err(secret_error)?,
            Some(_) => {
                warn!(
                    revision,
                    secret = %secret,
                    "secret is not managed by this resource, leaving it in place"
                );
                false
            }
            None => false,
        };
        if deleted {
            metrics::increment_secrets_deleted();
        }

        backend.remove_user(&user).await?;
        metrics::increment_backend_users_removed();

        debug!(revision, user = %user, secret_deleted = deleted, "retired revision");
        report.removed.push(revision);
    }

    Ok(report)
}
