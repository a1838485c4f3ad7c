//! # PostgreSQL Backend
//!
//! User management for PostgreSQL.
//!
//! Role names and passwords never appear in statement text. Lookups bind them
//! directly. DDL (`CREATE ROLE`, `GRANT`, `DROP USER`) cannot take bind
//! parameters, so the server assembles it with `format('%I' / '%L', ...)` from
//! bound values and the returned text is executed as-is.

use super::template::{self, Params, Rendered};
use super::{BackendError, BackendUser, CredentialBackend};
use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgPool, PgPoolOptions};
use sqlx::query::Query;
use sqlx::{Executor, PgConnection, Postgres, Row};
use std::time::Duration;
use tracing::debug;

pub const ROLE_EXISTS: &str = "SELECT 1 FROM pg_catalog.pg_roles WHERE rolname = {name}";
pub const CREATE_ROLE: &str =
    "SELECT format('CREATE ROLE %I LOGIN PASSWORD %L', {name}::text, {password}::text)";
pub const GRANT_ROLE: &str = "SELECT format('GRANT %I TO %I', {role}::text, {name}::text)";
pub const SESSION_EXISTS: &str = "SELECT 1 FROM pg_stat_activity WHERE usename = {name} LIMIT 1";
pub const DROP_USER: &str = "SELECT format('DROP USER IF EXISTS %I', {name}::text)";

pub struct PostgresBackend {
    pool: PgPool,
}

impl std::fmt::Debug for PostgresBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresBackend")
            .field("closed", &self.pool.is_closed())
            .finish()
    }
}

fn render<'a>(
    statement: &'static str,
    template: &str,
    params: &Params<'a>,
) -> Result<Rendered<'a>, BackendError> {
    template::render(template, params)
        .map_err(|source| BackendError::Template { statement, source })
}

fn bound<'q>(rendered: &'q Rendered<'q>) -> Query<'q, Postgres, PgArguments> {
    rendered
        .binds
        .iter()
        .fold(sqlx::query(&rendered.sql), |query, value| query.bind(*value))
}

fn failed(statement: &'static str) -> impl FnOnce(sqlx::Error) -> BackendError {
    move |source| BackendError::Statement { statement, source }
}

/// Ask the server to build a DDL statement from bound values, then run it
async fn execute_formatted(
    conn: &mut PgConnection,
    statement: &'static str,
    template: &str,
    params: &Params<'_>,
) -> Result<(), BackendError> {
    let rendered = render(statement, template, params)?;
    let row = (&mut *conn)
        .fetch_one(bound(&rendered))
        .await
        .map_err(failed(statement))?;
    let ddl: String = row.try_get(0).map_err(failed(statement))?;
    (&mut *conn)
        .execute(sqlx::raw_sql(&ddl))
        .await
        .map_err(failed(statement))?;
    Ok(())
}

impl PostgresBackend {
    /// Open a single-connection pool against the administrative URL
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Connect`] if the server cannot be reached within `timeout`.
    pub async fn connect(url: &str, timeout: Duration) -> Result<Self, BackendError> {
        // Never log `url`: it embeds the master password.
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(timeout)
            .connect(url)
            .await
            .map_err(|source| BackendError::Connect {
                driver: "postgres".to_string(),
                source,
            })?;
        Ok(Self::from_pool(pool))
    }

    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialBackend for PostgresBackend {
    async fn create_user(&self, user: &BackendUser) -> Result<bool, BackendError> {
        let params = Params::user(&user.name, &user.password, &user.role);
        let mut tx = self.pool.begin().await.map_err(failed("BEGIN"))?;

        let lookup = render("role lookup", ROLE_EXISTS, &params)?;
        let exists = bound(&lookup)
            .fetch_optional(&mut *tx)
            .await
            .map_err(failed("role lookup"))?
            .is_some();

        if exists {
            debug!(user = %user.name, "database user already exists");
        } else {
            execute_formatted(&mut *tx, "CREATE ROLE", CREATE_ROLE, &params).await?;
            debug!(user = %user.name, "database user created");
        }
        execute_formatted(&mut *tx, "GRANT", GRANT_ROLE, &params).await?;

        tx.commit().await.map_err(failed("COMMIT"))?;
        Ok(!exists)
    }

    async fn is_active(&self, name: &str) -> Result<bool, BackendError> {
        let rendered = render("session lookup", SESSION_EXISTS, &Params::name(name))?;
        let row = bound(&rendered)
            .fetch_optional(&self.pool)
            .await
            .map_err(failed("session lookup"))?;
        Ok(row.is_some())
    }

    async fn remove_user(&self, name: &str) -> Result<(), BackendError> {
        let mut conn = self.pool.acquire().await.map_err(failed("DROP USER"))?;
        execute_formatted(&mut conn, "DROP USER", DROP_USER, &Params::name(name)).await?;
        debug!(user = %name, "database user dropped");
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
