//! Common test utilities
//!
//! In-memory stores and a recording backend so the reconciler can be driven
//! without a cluster or a database.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use async_trait::async_trait;
use sql_credential_controller::backend::{
    BackendError, BackendFactory, BackendUser, CredentialBackend,
};
use sql_credential_controller::config::ControllerConfig;
use sql_credential_controller::constants::CREDENTIAL_LABEL;
use sql_credential_controller::controller::reconciler::Reconciler;
use sql_credential_controller::crd::{SqlCredential, SqlCredentialSpec, SqlCredentialStatus};
use sql_credential_controller::store::{
    CredentialStore, ResourceKey, SecretRecord, SecretStore, StoreError,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const NAMESPACE: &str = "default";

/// base64("test"), the master URL used throughout
pub const MASTER_URL_B64: &[u8] = b"dGVzdA==";

pub fn spec(revision: i64) -> SqlCredentialSpec {
    SqlCredentialSpec {
        driver: "mocked".to_string(),
        host: "dbhost".to_string(),
        database: "testdb".to_string(),
        revision,
        user: "testuser".to_string(),
        role: "testrole".to_string(),
        master_secret: "master".to_string(),
    }
}

pub fn credential(name: &str, revision: i64) -> SqlCredential {
    let mut credential = SqlCredential::new(name, spec(revision));
    credential.metadata.namespace = Some(NAMESPACE.to_string());
    credential.metadata.uid = Some(format!("uid-{name}"));
    credential.metadata.generation = Some(1);
    credential
}

pub fn key(name: &str) -> ResourceKey {
    ResourceKey::new(NAMESPACE, name)
}

pub fn master_secret(url_b64: &[u8]) -> SecretRecord {
    let mut record = SecretRecord::default();
    record.data.insert("url".to_string(), url_b64.to_vec());
    record
}

#[derive(Debug, Default)]
pub struct StoreState {
    pub credentials: HashMap<ResourceKey, SqlCredential>,
    pub secrets: BTreeMap<(String, String), SecretRecord>,
    pub status_updates: Vec<(ResourceKey, SqlCredentialStatus)>,
    pub secrets_created: Vec<String>,
    pub secrets_deleted: Vec<String>,
    pub fail_secret_delete: bool,
    /// Secrets reported missing for the given number of upcoming reads
    pub hidden_reads: HashMap<String, usize>,
}

/// Object store and secret store in one
#[derive(Debug, Default)]
pub struct MemoryStore {
    pub state: Mutex<StoreState>,
}

impl MemoryStore {
    pub fn with_master() -> Self {
        let store = Self::default();
        store.put_secret("master", master_secret(MASTER_URL_B64));
        store
    }

    pub fn put_credential(&self, credential: SqlCredential) {
        let key = ResourceKey::from_resource(&credential).expect("namespaced credential");
        self.state.lock().unwrap().credentials.insert(key, credential);
    }

    pub fn put_secret(&self, name: &str, record: SecretRecord) {
        self.state
            .lock()
            .unwrap()
            .secrets
            .insert((NAMESPACE.to_string(), name.to_string()), record);
    }

    pub fn secret(&self, name: &str) -> Option<SecretRecord> {
        self.state
            .lock()
            .unwrap()
            .secrets
            .get(&(NAMESPACE.to_string(), name.to_string()))
            .cloned()
    }

    pub fn secret_names(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .secrets
            .keys()
            .map(|(_, name)| name.clone())
            .collect()
    }

    pub fn status(&self, name: &str) -> Option<SqlCredentialStatus> {
        self.state
            .lock()
            .unwrap()
            .credentials
            .get(&key(name))
            .and_then(|credential| credential.status.clone())
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn get(&self, key: &ResourceKey) -> Result<Option<SqlCredential>, StoreError> {
        Ok(self.state.lock().unwrap().credentials.get(key).cloned())
    }

    async fn update_status(
        &self,
        key: &ResourceKey,
        status: &SqlCredentialStatus,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        let credential = state
            .credentials
            .get_mut(key)
            .ok_or_else(|| StoreError::Unavailable(format!("{key} vanished")))?;
        credential.status = Some(status.clone());
        state.status_updates.push((key.clone(), status.clone()));
        Ok(())
    }
}

#[async_trait]
impl SecretStore for MemoryStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<SecretRecord>, StoreError> {
        let mut state = self.state.lock().unwrap();
        if let Some(remaining) = state.hidden_reads.get_mut(name) {
            if *remaining > 0 {
                *remaining -= 1;
                return Ok(None);
            }
        }
        Ok(state
            .secrets
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }

    async fn create(
        &self,
        namespace: &str,
        name: &str,
        record: &SecretRecord,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        let id = (namespace.to_string(), name.to_string());
        if state.secrets.contains_key(&id) {
            return Err(StoreError::AlreadyExists {
                kind: "Secret",
                key: format!("{namespace}/{name}"),
            });
        }
        state.secrets.insert(id, record.clone());
        state.secrets_created.push(name.to_string());
        Ok(())
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<bool, StoreError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_secret_delete {
            return Err(StoreError::Unavailable("secret store offline".to_string()));
        }
        let removed = state
            .secrets
            .remove(&(namespace.to_string(), name.to_string()))
            .is_some();
        if removed {
            state.secrets_deleted.push(name.to_string());
        }
        Ok(removed)
    }
}

/// Backend operations in the order they were issued
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Create {
        name: String,
        password: String,
        role: String,
    },
    IsActive(String),
    Remove(String),
}

#[derive(Debug, Default)]
pub struct BackendState {
    pub connects: Vec<(String, String)>,
    pub calls: Vec<Call>,
    pub closes: usize,
    /// Users that currently exist, with their password
    pub users: BTreeMap<String, String>,
    /// Users with an open session
    pub active: BTreeSet<String>,
    /// Number of upcoming `create_user` calls that fail
    pub failing_creates: usize,
    pub fail_remove: bool,
    /// Delay applied inside `create_user`
    pub create_delay: Option<Duration>,
}

impl BackendState {
    pub fn creates(&self) -> Vec<&Call> {
        self.calls
            .iter()
            .filter(|call| matches!(call, Call::Create { .. }))
            .collect()
    }

    pub fn removes(&self) -> Vec<String> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::Remove(name) => Some(name.clone()),
                _ => None,
            })
            .collect()
    }
}

fn statement_failure(statement: &'static str) -> BackendError {
    BackendError::Statement {
        statement,
        source: sqlx::Error::PoolTimedOut,
    }
}

#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    pub state: Arc<Mutex<BackendState>>,
}

#[async_trait]
impl CredentialBackend for MockBackend {
    async fn create_user(&self, user: &BackendUser) -> Result<bool, BackendError> {
        let delay = self.state.lock().unwrap().create_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Create {
            name: user.name.clone(),
            password: user.password.clone(),
            role: user.role.clone(),
        });
        if state.failing_creates > 0 {
            state.failing_creates -= 1;
            return Err(statement_failure("CREATE ROLE"));
        }
        if state.users.contains_key(&user.name) {
            return Ok(false);
        }
        state.users.insert(user.name.clone(), user.password.clone());
        Ok(true)
    }

    async fn is_active(&self, name: &str) -> Result<bool, BackendError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::IsActive(name.to_string()));
        Ok(state.active.contains(name))
    }

    async fn remove_user(&self, name: &str) -> Result<(), BackendError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Remove(name.to_string()));
        if state.fail_remove {
            return Err(statement_failure("DROP USER"));
        }
        state.users.remove(name);
        Ok(())
    }

    async fn close(&self) {
        self.state.lock().unwrap().closes += 1;
    }
}

/// Hands out backends that all share one recorded state
#[derive(Debug, Clone, Default)]
pub struct MockFactory {
    pub backend: MockBackend,
}

#[async_trait]
impl BackendFactory for MockFactory {
    async fn connect(
        &self,
        driver: &str,
        url: &str,
    ) -> Result<Box<dyn CredentialBackend>, BackendError> {
        self.backend
            .state
            .lock()
            .unwrap()
            .connects
            .push((driver.to_string(), url.to_string()));
        Ok(Box::new(self.backend.clone()))
    }
}

/// A reconciler wired to in-memory collaborators
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub factory: MockFactory,
    pub reconciler: Arc<Reconciler>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(ControllerConfig::default())
    }

    pub fn with_config(config: ControllerConfig) -> Self {
        let store = Arc::new(MemoryStore::with_master());
        let factory = MockFactory::default();
        let reconciler = Arc::new(Reconciler::new(
            store.clone(),
            store.clone(),
            Arc::new(factory.clone()),
            config,
        ));
        Self {
            store,
            factory,
            reconciler,
        }
    }

    pub fn backend(&self) -> std::sync::MutexGuard<'_, BackendState> {
        self.factory.backend.state.lock().unwrap()
    }

    /// Seed the managed secret of an older revision
    pub fn seed_revision(&self, name: &str, revision: i64) {
        self.store
            .put_secret(&format!("{name}-{revision}"), managed_record(name, b"b2xkcGFzc3dvcmQ="));
        self.backend()
            .users
            .insert(format!("testuser_{revision}"), "oldpassword".to_string());
    }
}

/// A secret labelled as managed by `resource`, holding a base64 `password`
pub fn managed_record(resource: &str, password_b64: &[u8]) -> SecretRecord {
    let mut record = SecretRecord::default();
    record
        .data
        .insert("password".to_string(), password_b64.to_vec());
    record
        .labels
        .insert(CREDENTIAL_LABEL.to_string(), resource.to_string());
    record
}

/// Decode a base64 field of a stored secret
pub fn field(record: &SecretRecord, name: &str) -> String {
    use base64::Engine as _;
    let raw = record.data.get(name).expect("field present");
    String::from_utf8(
        base64::engine::general_purpose::STANDARD
            .decode(raw)
            .expect("base64 field"),
    )
    .expect("utf-8 field")
}
