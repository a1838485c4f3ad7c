//! SQL Credential Controller Library
//!
//! Rotates SQL database credentials declared as `SqlCredential` resources.
//! Each revision gets a managed secret and a database user; older revisions
//! are retired once nothing is connected as them anymore.
//!
//! ## Quick Start
//!
//! ```rust
//! use sql_credential_controller::prelude::*;
//! ```

pub mod backend;
pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod observability;
pub mod prelude;
pub mod runtime;
pub mod store;
