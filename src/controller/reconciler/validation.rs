//! # Validation
//!
//! Checks run before any side effect. A spec that fails here cannot heal
//! without an edit, so the error policy waits for the next change instead of
//! retrying.

use crate::crd::SqlCredentialSpec;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("revision must be at least 1, got {0}")]
    Revision(i64),
    #[error("spec.{0} must not be empty")]
    Empty(&'static str),
}

/// Validate a declared credential
///
/// # Errors
///
/// Returns the first problem found.
pub fn validate_spec(spec: &SqlCredentialSpec) -> Result<(), ValidationError> {
    if spec.revision < 1 {
        return Err(ValidationError::Revision(spec.revision));
    }
    for (field, value) in [
        ("driver", &spec.driver),
        ("user", &spec.user),
        ("role", &spec.role),
        ("masterSecret", &spec.master_secret),
    ] {
        if value.trim().is_empty() {
            return Err(ValidationError::Empty(field));
        }
    }
    Ok(())
}
