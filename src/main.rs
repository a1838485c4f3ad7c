//! # SQL Credential Controller
//!
//! Watches `SqlCredential` resources and keeps one database user and secret
//! per revision, retiring older revisions once their sessions drain.
//!
//! Configuration comes from environment variables; see `ControllerConfig`.

use anyhow::Result;
use sql_credential_controller::runtime::{initialization::initialize, watch_loop::run_watch_loop};

#[tokio::main]
async fn main() -> Result<()> {
    let init = initialize().await?;
    run_watch_loop(init).await
}
