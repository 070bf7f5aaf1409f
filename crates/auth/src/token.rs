//! Raw session tokens and their at-rest hashes.

use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rand::Rng;
use sha2::{Digest, Sha256};

/// 32 alphanumeric characters from the OS CSPRNG, ~190 bits of entropy.
const TOKEN_LENGTH: usize = 32;

/// Generate a fresh raw token. The raw token goes to the client; only its
/// hash is ever stored.
pub fn generate() -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

/// SHA-256 hex digest of a raw token, the only form persisted and used for
/// lookup.
pub fn hash(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}
