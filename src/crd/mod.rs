//! # Custom Resource Definitions
//!
//! CRD types for the SQL Credential Controller.
//!
//! ## Module Structure
//!
//! - `spec.rs` - `SqlCredential` specification and derived naming
//! - `status.rs` - Status types written back after every pass

mod spec;
mod status;

pub use spec::{SqlCredential, SqlCredentialSpec};
pub use status::{SqlCredentialStatus, PHASE_DRAINING, PHASE_READY};
