//! # Runtime
//!
//! Process wiring around the reconciler.
//!
//! - `initialization`: crypto provider, tracing, metrics, probe server, Kubernetes client
//! - `watch_loop`: the `kube_runtime` controller driving reconciliation
//! - `error_policy`: retry decisions for failed passes

pub mod error_policy;
pub mod initialization;
pub mod watch_loop;
