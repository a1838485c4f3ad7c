//! # Initialization
//!
//! Controller initialization: rustls setup, tracing, metrics, server startup,
//! Kubernetes client and reconciler wiring.

use crate::backend::SqlBackendFactory;
use crate::config::ControllerConfig;
use crate::controller::reconciler::Reconciler;
use crate::controller::server::{start_server, ServerState};
use crate::observability;
use crate::store::kubernetes::KubeStore;
use anyhow::{anyhow, Context, Result};
use kube::Client;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "sql_credential_controller=info";

/// Everything the watch loop needs
pub struct InitializationResult {
    pub client: Client,
    pub reconciler: Arc<Reconciler>,
    pub server_state: Arc<ServerState>,
    pub config: ControllerConfig,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field(
                "server_ready",
                &self
                    .server_state
                    .is_ready
                    .load(std::sync::atomic::Ordering::Relaxed),
            )
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Install the global tracing subscriber
///
/// `RUST_LOG` overrides the default filter. `format` is `json` or `text`.
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn init_tracing(format: &str) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let installed = if format.eq_ignore_ascii_case("json") {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .try_init()
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).try_init()
    };
    installed.map_err(|e| anyhow!("failed to install tracing subscriber: {e}"))
}

/// Initialize the controller runtime
///
/// # Errors
///
/// Fails if the crypto provider, tracing, metrics or Kubernetes client cannot
/// be set up.
pub async fn initialize() -> Result<InitializationResult> {
    // Must run before anything opens a TLS connection.
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("failed to install rustls crypto provider"))?;

    let config = ControllerConfig::from_env();
    init_tracing(&config.log_format)?;

    info!("Starting SQL Credential Controller");
    info!(
        "Build info: timestamp={}, datetime={}, git_hash={}",
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );
    info!(?config, "Loaded controller configuration");

    observability::metrics::register_metrics().context("failed to register metrics")?;

    let server_state = Arc::new(ServerState::default());
    let server_state_clone = server_state.clone();
    let port = config.metrics_port;
    tokio::spawn(async move {
        if let Err(e) = start_server(port, server_state_clone).await {
            error!("HTTP server error: {}", e);
        }
    });

    let client = Client::try_default()
        .await
        .context("failed to create Kubernetes client")?;

    let store = Arc::new(KubeStore::new(client.clone()));
    let backends = Arc::new(SqlBackendFactory::new(config.backend_connect_timeout()));
    let reconciler = Arc::new(Reconciler::new(
        store.clone(),
        store,
        backends,
        config.clone(),
    ));

    Ok(InitializationResult {
        client,
        reconciler,
        server_state,
        config,
    })
}
