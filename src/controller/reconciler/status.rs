//! # Status Management
//!
//! Writes the observed state back to the resource. Unchanged status is never
//! written, so a settled resource does not trigger its own watch again.

use crate::crd::{SqlCredential, SqlCredentialStatus};
use crate::store::{CredentialStore, ResourceKey, StoreError};
use tracing::debug;

/// Write `desired` unless the resource already carries it; returns whether a write happened
///
/// # Errors
///
/// Propagates the store error from the status update.
pub async fn update_status(
    store: &dyn CredentialStore,
    key: &ResourceKey,
    credential: &SqlCredential,
    desired: &SqlCredentialStatus,
) -> Result<bool, StoreError> {
    if credential.status.as_ref() == Some(desired) {
        debug!(resource = %key, "status unchanged, skipping update");
        return Ok(false);
    }
    store.update_status(key, desired).await?;
    debug!(
        resource = %key,
        phase = desired.phase.as_deref().unwrap_or_default(),
        active_revisions = ?desired.active_revisions,
        "status updated"
    );
    Ok(true)
}
