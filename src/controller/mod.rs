//! # Controller
//!
//! Core controller modules for the SQL Credential Controller.
//!
//! - `backoff`: Fibonacci backoff for failed reconciliations
//! - `reconciler`: Core reconciliation logic
//! - `server`: HTTP server for metrics and health checks

pub mod backoff;
pub mod reconciler;
pub mod server;
