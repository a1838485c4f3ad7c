//! # SqlCredential Spec
//!
//! The declared desired state of one rotating database credential.

use serde::{Deserialize, Serialize};

/// SqlCredential Custom Resource Definition
///
/// Each revision of the resource owns a generated secret and a database user.
/// Bumping `revision` rolls out a new user; older users are dropped once no
/// session is connected as them anymore.
///
/// # Example
///
/// ```yaml
/// apiVersion: sql.credentials.io/v1alpha1
/// kind: SqlCredential
/// metadata:
///   name: orders
///   namespace: default
/// spec:
///   driver: postgres
///   host: orders-db.default.svc:5432
///   database: orders
///   revision: 3
///   user: orders_app
///   role: orders_rw
///   masterSecret: orders-db-master
/// ```
#[derive(kube::CustomResource, Debug, Clone, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "SqlCredential",
    group = "sql.credentials.io",
    version = "v1alpha1",
    namespaced,
    status = "crate::crd::SqlCredentialStatus",
    shortname = "sqlcred",
    printcolumn = r#"{"name":"Revision", "type":"integer", "jsonPath":".spec.revision"}, {"name":"Phase", "type":"string", "jsonPath":".status.phase"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct SqlCredentialSpec {
    /// Backend dialect, e.g. "postgres"
    pub driver: String,
    /// Database host (and optional port) written into generated connection URLs
    pub host: String,
    /// Target database written into generated connection URLs
    pub database: String,
    /// Credential generation; must be at least 1 and only ever increase
    pub revision: i64,
    /// Base user name; the database user for revision N is `<user>_<N>`
    pub user: String,
    /// Database role granted to every generated user
    pub role: String,
    /// Name of a secret in the same namespace whose `url` field holds an
    /// administrative connection URL
    pub master_secret: String,
}

impl SqlCredentialSpec {
    /// Database user name for a given revision
    #[must_use]
    pub fn user_for_revision(&self, revision: i64) -> String {
        format!("{}_{}", self.user, revision)
    }

    /// Database user name for the declared revision
    #[must_use]
    pub fn current_user(&self) -> String {
        self.user_for_revision(self.revision)
    }
}
