//! Password hashing with bcrypt.

use crate::error::Result;

/// Hash a plaintext password for storage.
pub fn hash(password: &str) -> Result<String> {
    Ok(bcrypt::hash(password, bcrypt::DEFAULT_COST)?)
}

/// Verify a plaintext password against a stored hash.
///
/// Returns `Ok(false)` on mismatch; an error only when the stored hash is
/// malformed.
pub fn verify(password: &str, password_hash: &str) -> Result<bool> {
    Ok(bcrypt::verify(password, password_hash)?)
}
