//! Signed OAuth `state` values.
//!
//! The consent redirect comes back to an unauthenticated callback, so the
//! user the grant belongs to travels inside `state`:
//! `base64url(user_id|expires_unix_secs|hex(hmac_sha256))`.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateError {
    #[error("state parameter is malformed")]
    Malformed,
    #[error("state signature mismatch")]
    BadSignature,
    #[error("state parameter expired")]
    Expired,
}

/// Issues and checks OAuth `state` values bound to a user id.
#[derive(Clone)]
pub struct StateSigner {
    key: [u8; 32],
    ttl: Duration,
}

impl std::fmt::Debug for StateSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateSigner")
            .field("key", &"[REDACTED]")
            .field("ttl", &self.ttl)
            .finish()
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

impl StateSigner {
    /// Derives the HMAC key from `secret` with a domain-separation prefix.
    pub fn new(secret: &str, ttl: Duration) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"murmur-oauth-state-v1:");
        hasher.update(secret.as_bytes());
        let mut key = [0u8; 32];
        key.copy_from_slice(&hasher.finalize());
        Self { key, ttl }
    }

    fn mac(&self, payload: &str) -> HmacSha256 {
        let mut mac =
            HmacSha256::new_from_slice(&self.key).expect("HMAC accepts keys of any length");
        mac.update(payload.as_bytes());
        mac
    }

    pub fn sign(&self, user_id: &str) -> String {
        self.sign_at(user_id, unix_now())
    }

    fn sign_at(&self, user_id: &str, now: u64) -> String {
        let payload = format!("{}|{}", user_id, now + self.ttl.as_secs());
        let signature = self.mac(&payload).finalize().into_bytes();
        URL_SAFE_NO_PAD.encode(format!("{}|{}", payload, hex::encode(signature)))
    }

    /// Returns the user id the state was issued for.
    pub fn verify(&self, state: &str) -> Result<String, StateError> {
        self.verify_at(state, unix_now())
    }

    fn verify_at(&self, state: &str, now: u64) -> Result<String, StateError> {
        let decoded = URL_SAFE_NO_PAD
            .decode(state.as_bytes())
            .map_err(|_| StateError::Malformed)?;
        let decoded = String::from_utf8(decoded).map_err(|_| StateError::Malformed)?;

        // user|expires|sig, split from the right so the user id may hold '|'
        let mut parts = decoded.rsplitn(3, '|');
        let (Some(sig_hex), Some(expires_str), Some(user_id)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(StateError::Malformed);
        };
        if user_id.is_empty() {
            return Err(StateError::Malformed);
        }

        let provided = hex::decode(sig_hex).map_err(|_| StateError::Malformed)?;
        self.mac(&format!("{user_id}|{expires_str}"))
            .verify_slice(&provided)
            .map_err(|_| StateError::BadSignature)?;

        let expires: u64 = expires_str.parse().map_err(|_| StateError::Malformed)?;
        if now > expires {
            return Err(StateError::Expired);
        }
        Ok(user_id.to_string())
    }
}
