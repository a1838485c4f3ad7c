//! # Credential Backends
//!
//! Database-side user management. The reconciler works against
//! [`CredentialBackend`] and obtains connections from an injected
//! [`BackendFactory`], so tests can substitute a recording mock.
//!
//! [`SqlBackendFactory`] is the production factory. It dispatches on the
//! resource's `driver`; a driver it does not know yields
//! [`SqlBackend::Unsupported`], whose operations all fail with
//! [`BackendError::UnsupportedDriver`].

pub mod postgres;
pub mod template;

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

pub use postgres::PostgresBackend;
pub use template::TemplateError;

/// A database user to provision
#[derive(Clone, PartialEq, Eq)]
pub struct BackendUser {
    pub name: String,
    pub password: String,
    pub role: String,
}

impl fmt::Debug for BackendUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendUser")
            .field("name", &self.name)
            .field("password", &"<redacted>")
            .field("role", &self.role)
            .finish()
    }
}

/// SQL dialects with a backend implementation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Driver {
    Postgres,
}

impl Driver {
    #[must_use]
    pub fn parse(driver: &str) -> Option<Self> {
        match driver.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Some(Self::Postgres),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("unsupported driver: {0}")]
    UnsupportedDriver(String),
    #[error("failed to connect to {driver} backend: {source}")]
    Connect {
        driver: String,
        #[source]
        source: sqlx::Error,
    },
    #[error("{statement} statement failed: {source}")]
    Statement {
        statement: &'static str,
        #[source]
        source: sqlx::Error,
    },
    #[error("failed to render {statement} statement: {source}")]
    Template {
        statement: &'static str,
        #[source]
        source: TemplateError,
    },
}

/// User management operations against one database
#[async_trait]
pub trait CredentialBackend: Send + Sync {
    /// Create `user` if it does not exist, then grant it its role
    ///
    /// Returns `true` when the user was created by this call.
    async fn create_user(&self, user: &BackendUser) -> Result<bool, BackendError>;

    /// Whether any session is currently connected as `name`
    async fn is_active(&self, name: &str) -> Result<bool, BackendError>;

    /// Drop `name`; dropping a user that does not exist succeeds
    async fn remove_user(&self, name: &str) -> Result<(), BackendError>;

    /// Release the connection
    async fn close(&self);
}

/// Opens a backend for a driver and administrative connection URL
#[async_trait]
pub trait BackendFactory: Send + Sync {
    async fn connect(
        &self,
        driver: &str,
        url: &str,
    ) -> Result<Box<dyn CredentialBackend>, BackendError>;
}

/// Backend selected by driver name
#[derive(Debug)]
pub enum SqlBackend {
    Postgres(PostgresBackend),
    Unsupported { driver: String },
}

#[async_trait]
impl CredentialBackend for SqlBackend {
    async fn create_user(&self, user: &BackendUser) -> Result<bool, BackendError> {
        match self {
            Self::Postgres(backend) => backend.create_user(user).await,
            Self::Unsupported { driver } => Err(BackendError::UnsupportedDriver(driver.clone())),
        }
    }

    async fn is_active(&self, name: &str) -> Result<bool, BackendError> {
        match self {
            Self::Postgres(backend) => backend.is_active(name).await,
            Self::Unsupported { driver } => Err(BackendError::UnsupportedDriver(driver.clone())),
        }
    }

    async fn remove_user(&self, name: &str) -> Result<(), BackendError> {
        match self {
            Self::Postgres(backend) => backend.remove_user(name).await,
            Self::Unsupported { driver } => Err(BackendError::UnsupportedDriver(driver.clone())),
        }
    }

    async fn close(&self) {
        if let Self::Postgres(backend) = self {
            backend.close().await;
        }
    }
}

/// Production factory: one small pool per pass
#[derive(Debug, Clone)]
pub struct SqlBackendFactory {
    connect_timeout: Duration,
}

impl SqlBackendFactory {
    #[must_use]
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }

    /// Resolve the backend variant for `driver` and connect it
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Connect`] if a supported backend cannot be reached.
    pub async fn open(&self, driver: &str, url: &str) -> Result<SqlBackend, BackendError> {
        match Driver::parse(driver) {
            Some(Driver::Postgres) => Ok(SqlBackend::Postgres(
                PostgresBackend::connect(url, self.connect_timeout).await?,
            )),
            None => Ok(SqlBackend::Unsupported {
                driver: driver.to_string(),
            }),
        }
    }
}

#[async_trait]
impl BackendFactory for SqlBackendFactory {
    async fn connect(
        &self,
        driver: &str,
        url: &str,
    ) -> Result<Box<dyn CredentialBackend>, BackendError> {
        Ok(Box::new(self.open(driver, url).await?))
    }
}
