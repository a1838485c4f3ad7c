//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! Durations are defaults; `ControllerConfig` lets operators override them
//! through environment variables.

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 5000;

/// Default deadline for a single reconciliation pass (seconds)
pub const DEFAULT_RECONCILE_TIMEOUT_SECS: u64 = 60;

/// Default requeue interval while an older revision still has open sessions (seconds)
pub const DEFAULT_GC_REQUEUE_SECS: u64 = 30;

/// Default Fibonacci backoff floor for failed reconciliations (minutes)
pub const DEFAULT_BACKOFF_MIN_MINUTES: u64 = 1;

/// Default Fibonacci backoff ceiling for failed reconciliations (minutes)
pub const DEFAULT_BACKOFF_MAX_MINUTES: u64 = 10;

/// Default time allowed to open a backend connection (seconds)
pub const DEFAULT_BACKEND_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default number of resources reconciled at the same time
pub const DEFAULT_MAX_CONCURRENT_RECONCILIATIONS: u16 = 10;

/// Bytes of entropy in every generated password (rendered as 32 hex characters)
pub const PASSWORD_BYTES: usize = 16;

/// Field of the master secret holding the administrative connection URL
pub const MASTER_URL_FIELD: &str = "url";

/// Label put on every managed secret, valued with the owning resource name
pub const CREDENTIAL_LABEL: &str = "sql.credentials.io/credential";
