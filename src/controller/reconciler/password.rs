//! # Password Generation
//!
//! Passwords are random bytes from the operating system CSPRNG rendered as
//! lowercase hex, so 16 bytes give a 32-character password.

use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;
use zeroize::Zeroizing;

#[derive(Debug, Error)]
#[error("random source unavailable: {0}")]
pub struct PasswordError(#[from] rand::Error);

/// Generate a password from `len` random bytes
///
/// # Errors
///
/// Fails only if the operating system random source fails.
pub fn generate_password(len: usize) -> Result<String, PasswordError> {
    let mut bytes = Zeroizing::new(vec![0u8; len]);
    OsRng.try_fill_bytes(bytes.as_mut_slice())?;
    Ok(hex::encode(bytes.as_slice()))
}
