//! # Stores
//!
//! Interfaces to the object store holding `SqlCredential` resources and to the
//! namespaced secret store holding managed secrets.
//!
//! The reconciler only talks to these traits. [`kubernetes::KubeStore`] implements
//! both against the Kubernetes API; tests provide in-memory versions.

pub mod kubernetes;

use crate::constants::CREDENTIAL_LABEL;
use crate::crd::{SqlCredential, SqlCredentialStatus};
use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Secret payload, field name to stored bytes
pub type SecretData = BTreeMap<String, Vec<u8>>;

/// Namespaced identity of a `SqlCredential`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey {
    pub namespace: String,
    pub name: String,
}

impl ResourceKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Key of a resource as delivered by the watch; `None` when name or namespace is missing
    #[must_use]
    pub fn from_resource(credential: &SqlCredential) -> Option<Self> {
        Some(Self::new(
            credential.metadata.namespace.clone()?,
            credential.metadata.name.clone()?,
        ))
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// A secret's data together with its ownership marks
#[derive(Clone, Default, PartialEq)]
pub struct SecretRecord {
    pub data: SecretData,
    pub labels: BTreeMap<String, String>,
    pub owner: Option<OwnerReference>,
}

impl fmt::Debug for SecretRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretRecord")
            .field("fields", &self.data.keys().collect::<Vec<_>>())
            .field("labels", &self.labels)
            .field("owner", &self.owner.as_ref().map(|o| &o.name))
            .finish()
    }
}

impl SecretRecord {
    /// Whether the secret belongs to the `SqlCredential` at `key`: it carries
    /// the credential label with that name, or a controller owner reference
    /// with the resource's `uid`
    #[must_use]
    pub fn is_managed_by(&self, key: &ResourceKey, uid: Option<&str>) -> bool {
        let labelled = self
            .labels
            .get(CREDENTIAL_LABEL)
            .is_some_and(|name| *name == key.name);
        let owned = match (&self.owner, uid) {
            (Some(owner), Some(uid)) => owner.uid == uid,
            _ => false,
        };
        labelled || owned
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),
    #[error("{kind} {key} already exists")]
    AlreadyExists { kind: &'static str, key: String },
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Object store for the declared resources
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Fetch a resource; `Ok(None)` when it does not exist
    async fn get(&self, key: &ResourceKey) -> Result<Option<SqlCredential>, StoreError>;

    /// Replace the status of a resource
    async fn update_status(
        &self,
        key: &ResourceKey,
        status: &SqlCredentialStatus,
    ) -> Result<(), StoreError>;
}

/// Namespaced key/value secret store
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Fetch a secret with its labels and controller owner; `Ok(None)` when it does not exist
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<SecretRecord>, StoreError>;

    /// Create a secret; fails with [`StoreError::AlreadyExists`] if the name is taken
    async fn create(
        &self,
        namespace: &str,
        name: &str,
        record: &SecretRecord,
    ) -> Result<(), StoreError>;

    /// Delete a secret; returns whether anything was deleted
    async fn delete(&self, namespace: &str, name: &str) -> Result<bool, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::SqlCredentialSpec;

    fn credential() -> SqlCredential {
        SqlCredential::new(
            "test",
            SqlCredentialSpec {
                driver: "postgres".to_string(),
                host: "dbhost".to_string(),
                database: "testdb".to_string(),
                revision: 1,
                user: "testuser".to_string(),
                role: "testrole".to_string(),
                master_secret: "master".to_string(),
            },
        )
    }

    #[test]
    fn test_resource_key_requires_namespace() {
        let mut credential = credential();
        assert!(ResourceKey::from_resource(&credential).is_none());

        credential.metadata.namespace = Some("default".to_string());
        let key = ResourceKey::from_resource(&credential).expect("namespaced key");
        assert_eq!(key, ResourceKey::new("default", "test"));
        assert_eq!(key.to_string(), "default/test");
    }

    #[test]
    fn test_secret_record_debug_hides_values() {
        let mut record = SecretRecord::default();
        record
            .data
            .insert("password".to_string(), b"hunter2".to_vec());
        let rendered = format!("{record:?}");
        assert!(rendered.contains("password"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn test_secret_is_managed_by_label_or_owner() {
        let key = ResourceKey::new("default", "test");
        let mut record = SecretRecord::default();
        assert!(!record.is_managed_by(&key, Some("uid-test")));

        record
            .labels
            .insert(CREDENTIAL_LABEL.to_string(), "other".to_string());
        assert!(!record.is_managed_by(&key, Some("uid-test")));

        record
            .labels
            .insert(CREDENTIAL_LABEL.to_string(), "test".to_string());
        assert!(record.is_managed_by(&key, None));

        let mut owned = SecretRecord {
            owner: Some(OwnerReference {
                uid: "uid-test".to_string(),
                controller: Some(true),
                ..OwnerReference::default()
            }),
            ..SecretRecord::default()
        };
        assert!(owned.is_managed_by(&key, Some("uid-test")));
        assert!(!owned.is_managed_by(&key, Some("uid-other")));
        assert!(!owned.is_managed_by(&key, None));
        owned.owner = None;
        assert!(!owned.is_managed_by(&key, Some("uid-test")));
    }
}
