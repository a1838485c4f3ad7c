//! # Kubernetes Store
//!
//! [`CredentialStore`] and [`SecretStore`] backed by the Kubernetes API:
//! `SqlCredential` custom resources and core `Secret`s in the same namespace.

use super::{CredentialStore, ResourceKey, SecretData, SecretRecord, SecretStore, StoreError};
use crate::crd::{SqlCredential, SqlCredentialStatus};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use kube::api::{Api, DeleteParams, Patch, PatchParams, PostParams};
use kube::Client;
use tracing::debug;

#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl std::fmt::Debug for KubeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeStore").finish_non_exhaustive()
    }
}

impl KubeStore {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn credentials(&self, namespace: &str) -> Api<SqlCredential> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn secrets(&self, namespace: &str) -> Api<Secret> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

/// Build the `Secret` object for a record
#[must_use]
pub fn secret_object(namespace: &str, name: &str, record: &SecretRecord) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            labels: (!record.labels.is_empty()).then(|| record.labels.clone()),
            owner_references: record.owner.clone().map(|owner| vec![owner]),
            ..ObjectMeta::default()
        },
        data: Some(
            record
                .data
                .iter()
                .map(|(field, value)| (field.clone(), ByteString(value.clone())))
                .collect(),
        ),
        type_: Some("Opaque".to_string()),
        ..Secret::default()
    }
}

/// Data, labels and controller owner of a fetched `Secret`
#[must_use]
pub fn secret_record(secret: Secret) -> SecretRecord {
    let data: SecretData = secret
        .data
        .unwrap_or_default()
        .into_iter()
        .map(|(field, value)| (field, value.0))
        .collect();
    SecretRecord {
        data,
        labels: secret.metadata.labels.unwrap_or_default(),
        owner: secret
            .metadata
            .owner_references
            .unwrap_or_default()
            .into_iter()
            .find(|owner| owner.controller == Some(true)),
    }
}

fn is_status(error: &kube::Error, code: u16) -> bool {
    matches!(error, kube::Error::Api(response) if response.code == code)
}

#[async_trait]
impl CredentialStore for KubeStore {
    async fn get(&self, key: &ResourceKey) -> Result<Option<SqlCredential>, StoreError> {
        Ok(self.credentials(&key.namespace).get_opt(&key.name).await?)
    }

    async fn update_status(
        &self,
        key: &ResourceKey,
        status: &SqlCredentialStatus,
    ) -> Result<(), StoreError> {
        let patch = serde_json::json!({ "status": status });
        self.credentials(&key.namespace)
            .patch_status(&key.name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        debug!(resource = %key, "status patched");
        Ok(())
    }
}

#[async_trait]
impl SecretStore for KubeStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<SecretRecord>, StoreError> {
        let secret = self.secrets(namespace).get_opt(name).await?;
        Ok(secret.map(secret_record))
    }

    async fn create(
        &self,
        namespace: &str,
        name: &str,
        record: &SecretRecord,
    ) -> Result<(), StoreError> {
        let secret = secret_object(namespace, name, record);
        match self
            .secrets(namespace)
            .create(&PostParams::default(), &secret)
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if is_status(&e, 409) => Err(StoreError::AlreadyExists {
                kind: "Secret",
                key: format!("{namespace}/{name}"),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<bool, StoreError> {
        match self
            .secrets(namespace)
            .delete(name, &DeleteParams::default())
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if is_status(&e, 404) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
