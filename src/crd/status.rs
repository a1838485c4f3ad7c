//! # SqlCredential Status
//!
//! Observed state written back by the reconciler.

use serde::{Deserialize, Serialize};

/// Every revision older than the declared one has been collected
pub const PHASE_READY: &str = "Ready";

/// An older revision still has open sessions and is kept until they drain
pub const PHASE_DRAINING: &str = "Draining";

/// Status of the SqlCredential resource
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SqlCredentialStatus {
    /// Revisions whose secret and database user are still retained, oldest first
    #[serde(default)]
    pub active_revisions: Vec<String>,
    /// Generation of the spec the status was computed from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
    /// Values: Ready, Draining
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
}

impl SqlCredentialStatus {
    /// Status after a pass that kept `oldest_retained..=current`
    #[must_use]
    pub fn retained(oldest_retained: i64, current: i64, observed_generation: Option<i64>) -> Self {
        let phase = if oldest_retained < current {
            PHASE_DRAINING
        } else {
            PHASE_READY
        };
        Self {
            active_revisions: (oldest_retained..=current).map(|r| r.to_string()).collect(),
            observed_generation,
            phase: Some(phase.to_string()),
        }
    }
}
