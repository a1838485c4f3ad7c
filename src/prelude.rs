//! Commonly used types.

pub use crate::backend::{
    BackendError, BackendFactory, BackendUser, CredentialBackend, SqlBackend, SqlBackendFactory,
};
pub use crate::config::ControllerConfig;
pub use crate::controller::reconciler::{
    reconcile, ReconcileOutcome, Reconciler, ReconcilerError,
};
pub use crate::crd::{SqlCredential, SqlCredentialSpec, SqlCredentialStatus};
pub use crate::store::{CredentialStore, ResourceKey, SecretData, SecretRecord, SecretStore, StoreError};
