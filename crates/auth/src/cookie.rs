//! Authenticated cookie payloads.
//!
//! Payloads are small ordered string maps sealed with AES-256-GCM. The
//! cookie name is bound in as associated data, so a value lifted from one
//! cookie never decodes under another name. Any modification of the
//! transported value fails decryption outright; there is no partially
//! trusted result.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::{STANDARD as BASE64_STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use crate::error::{AuthError, Result};

const NONCE_LEN: usize = 12;

/// Stateless given its key; the key is process-wide and immutable after
/// startup, so concurrent use needs no synchronization.
pub struct CookieCodec {
    cipher: Aes256Gcm,
}

impl CookieCodec {
    /// Derive a 256-bit key from the secret using SHA-256.
    pub fn new(secret: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(secret.as_bytes());
        let key_bytes = hasher.finalize();
        let cipher = Aes256Gcm::new_from_slice(&key_bytes)
            .expect("AES-256-GCM key must be 32 bytes");

        Self { cipher }
    }

    /// Fresh random secret for processes started without one configured.
    /// Sessions issued under a generated secret do not survive a restart.
    pub fn generate_secret() -> String {
        let mut bytes = [0u8; 64];
        OsRng.fill_bytes(&mut bytes);
        BASE64_STANDARD.encode(bytes)
    }

    /// Seal a payload into a cookie value: random nonce followed by the
    /// ciphertext of the JSON-serialized map, base64-url encoded.
    pub fn encode(&self, name: &str, values: &BTreeMap<String, String>) -> Result<String> {
        let plaintext = serde_json::to_vec(values)
            .map_err(|e| AuthError::Internal(format!("Cookie payload serialization: {}", e)))?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(
                nonce,
                Payload {
                    msg: &plaintext,
                    aad: name.as_bytes(),
                },
            )
            .map_err(|e| AuthError::Internal(format!("Cookie encrypt error: {}", e)))?;

        let mut payload = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        payload.extend_from_slice(&nonce_bytes);
        payload.extend_from_slice(&ciphertext);

        Ok(URL_SAFE_NO_PAD.encode(payload))
    }

    /// Open a cookie value. Tampered values, values sealed under another
    /// name, and values sealed under another key all fail here; the caller
    /// must treat the failure as a hard error, never as an empty payload.
    pub fn decode(&self, name: &str, value: &str) -> Result<BTreeMap<String, String>> {
        let payload = URL_SAFE_NO_PAD
            .decode(value)
            .map_err(|e| AuthError::InvalidCookie(format!("bad encoding: {}", e)))?;

        if payload.len() < NONCE_LEN {
            return Err(AuthError::InvalidCookie("payload too short".to_string()));
        }

        let (nonce_bytes, ciphertext) = payload.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);

        let plaintext = self
            .cipher
            .decrypt(
                nonce,
                Payload {
                    msg: ciphertext,
                    aad: name.as_bytes(),
                },
            )
            .map_err(|_| AuthError::InvalidCookie("authentication failed".to_string()))?;

        serde_json::from_slice(&plaintext)
            .map_err(|e| AuthError::InvalidCookie(format!("bad payload: {}", e)))
    }
}
