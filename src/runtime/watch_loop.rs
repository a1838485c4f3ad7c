//! # Watch Loop
//!
//! Runs the `kube_runtime` controller over `SqlCredential` resources and the
//! secrets they own. The controller never runs two passes for the same
//! resource at once; distinct resources run concurrently up to the
//! configured limit.

use crate::constants::CREDENTIAL_LABEL;
use crate::controller::reconciler::reconcile;
use crate::crd::SqlCredential;
use crate::runtime::error_policy::handle_reconciliation_error;
use crate::runtime::initialization::InitializationResult;
use futures::StreamExt;
use k8s_openapi::api::core::v1::Secret;
use kube::api::Api;
use kube::Client;
use kube_runtime::{controller, watcher, Controller};
use tracing::{debug, info, warn};

fn scoped_api<K>(client: Client, namespace: Option<&str>) -> Api<K>
where
    K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>,
    <K as kube::Resource>::DynamicType: Default,
{
    match namespace {
        Some(namespace) => Api::namespaced(client, namespace),
        None => Api::all(client),
    }
}

/// Run the controller until a shutdown signal arrives
pub async fn run_watch_loop(init: InitializationResult) -> Result<(), anyhow::Error> {
    let InitializationResult {
        client,
        reconciler,
        server_state,
        config,
    } = init;

    let namespace = config.watch_namespace.as_deref();
    let credentials: Api<SqlCredential> = scoped_api(client.clone(), namespace);
    let secrets: Api<Secret> = scoped_api(client, namespace);

    match namespace {
        Some(namespace) => info!("Watching SqlCredentials in namespace {}", namespace),
        None => info!("Watching SqlCredentials in all namespaces"),
    }

    let controller_config =
        controller::Config::default().concurrency(config.max_concurrent_reconciliations);

    server_state.mark_ready();

    Controller::new(credentials, watcher::Config::default().any_semantic())
        .owns(secrets, watcher::Config::default().labels(CREDENTIAL_LABEL))
        .with_config(controller_config)
        .shutdown_on_signal()
        .run(reconcile, handle_reconciliation_error, reconciler)
        .for_each(|result| {
            match result {
                Ok((object, action)) => debug!(resource = %object.name, ?action, "reconciled"),
                Err(e) => warn!("Controller stream error: {}", e),
            }
            futures::future::ready(())
        })
        .await;

    server_state.mark_not_ready();
    info!("Controller stopped gracefully");
    Ok(())
}
