//! # Controller Configuration
//!
//! Controller-level settings loaded from environment variables.

use std::time::Duration;

/// Controller-level configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
/// Environment variables are populated from a ConfigMap using `envFrom` in the deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Deadline for one reconciliation pass (seconds)
    /// A pass that runs longer is aborted and reported as a timeout
    pub reconcile_timeout_secs: u64,
    /// Requeue interval while an older revision still has open sessions (seconds)
    pub gc_requeue_secs: u64,
    /// Fibonacci backoff floor for failed passes (minutes)
    pub backoff_min_minutes: u64,
    /// Fibonacci backoff ceiling for failed passes (minutes)
    pub backoff_max_minutes: u64,
    /// Time allowed to open a backend connection (seconds)
    pub backend_connect_timeout_secs: u64,
    /// Maximum concurrent reconciliations
    /// The watch loop never runs two passes for the same resource at once regardless of this value
    pub max_concurrent_reconciliations: u16,
    /// Port of the metrics and probe server
    pub metrics_port: u16,
    /// Log format (json, text)
    pub log_format: String,
    /// Restrict the controller to a single namespace; watches all namespaces when unset
    pub watch_namespace: Option<String>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        use crate::constants::*;
        Self {
            reconcile_timeout_secs: DEFAULT_RECONCILE_TIMEOUT_SECS,
            gc_requeue_secs: DEFAULT_GC_REQUEUE_SECS,
            backoff_min_minutes: DEFAULT_BACKOFF_MIN_MINUTES,
            backoff_max_minutes: DEFAULT_BACKOFF_MAX_MINUTES,
            backend_connect_timeout_secs: DEFAULT_BACKEND_CONNECT_TIMEOUT_SECS,
            max_concurrent_reconciliations: DEFAULT_MAX_CONCURRENT_RECONCILIATIONS,
            metrics_port: DEFAULT_METRICS_PORT,
            log_format: "text".to_string(),
            watch_namespace: None,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    ///
    /// Unparseable values fall back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            reconcile_timeout_secs: parsed_or(
                &lookup,
                "RECONCILE_TIMEOUT_SECS",
                defaults.reconcile_timeout_secs,
            ),
            gc_requeue_secs: parsed_or(&lookup, "GC_REQUEUE_SECS", defaults.gc_requeue_secs),
            backoff_min_minutes: parsed_or(
                &lookup,
                "BACKOFF_MIN_MINUTES",
                defaults.backoff_min_minutes,
            ),
            backoff_max_minutes: parsed_or(
                &lookup,
                "BACKOFF_MAX_MINUTES",
                defaults.backoff_max_minutes,
            ),
            backend_connect_timeout_secs: parsed_or(
                &lookup,
                "BACKEND_CONNECT_TIMEOUT_SECS",
                defaults.backend_connect_timeout_secs,
            ),
            max_concurrent_reconciliations: parsed_or(
                &lookup,
                "MAX_CONCURRENT_RECONCILIATIONS",
                defaults.max_concurrent_reconciliations,
            ),
            metrics_port: parsed_or(&lookup, "METRICS_PORT", defaults.metrics_port),
            log_format: lookup("LOG_FORMAT")
                .map(|v| v.trim().to_lowercase())
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.log_format),
            watch_namespace: lookup("WATCH_NAMESPACE").filter(|v| !v.trim().is_empty()),
        }
    }

    /// Get reconciliation deadline
    #[must_use]
    pub fn reconcile_timeout(&self) -> Duration {
        Duration::from_secs(self.reconcile_timeout_secs)
    }

    /// Get requeue interval used while older revisions drain
    #[must_use]
    pub fn gc_requeue_interval(&self) -> Duration {
        Duration::from_secs(self.gc_requeue_secs)
    }

    /// Get backend connect timeout
    #[must_use]
    pub fn backend_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.backend_connect_timeout_secs)
    }
}

fn parsed_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
