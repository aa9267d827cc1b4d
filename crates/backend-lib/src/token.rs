// ============================
// enrol-backend-lib/src/token.rs
// ============================
//! Signed, timestamped tokens.
//!
//! A token is three base64url (unpadded) segments joined by dots:
//!
//! ```text
//! <json payload>.<issue time, u64 big-endian seconds>.<HMAC-SHA256>
//! ```
//!
//! The signature covers the first two segments and is keyed by
//! `HMAC-SHA256(secret, salt)`, so a token minted for one purpose never
//! verifies under another salt. Nothing is stored server side.
use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde::{de::DeserializeOwned, Serialize};
use sha2::Sha256;
use thiserror::Error;
use zeroize::Zeroizing;

use crate::clock::Clock;

type HmacSha256 = Hmac<Sha256>;

/// Failures of token issuance and verification
#[derive(Debug, Error)]
pub enum TokenError {
    /// Signature is valid but the token is older than the allowed age,
    /// or claims to come from the future
    #[error("token expired: age {age_secs}s exceeds {max_age_secs}s")]
    Expired { age_secs: i64, max_age_secs: u64 },

    /// Malformed token, wrong salt or secret, or tampered content
    #[error("invalid token signature")]
    InvalidSignature,

    #[error("failed to encode token payload: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("signing key rejected")]
    Key,
}

/// Issues and verifies signed tokens with a fixed secret
#[derive(Clone)]
pub struct TokenService {
    secret: Arc<Zeroizing<Vec<u8>>>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService").finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn new(secret: impl Into<Vec<u8>>, clock: Arc<dyn Clock>) -> Self {
        Self {
            secret: Arc::new(Zeroizing::new(secret.into())),
            clock,
        }
    }

    /// Serialize `payload` and sign it together with the current time
    pub fn issue<T: Serialize>(&self, payload: &T, salt: &str) -> Result<String, TokenError> {
        let body = URL_SAFE_NO_PAD.encode(serde_json::to_vec(payload)?);
        let issued_at = self.clock.now().timestamp().max(0) as u64;
        let stamp = URL_SAFE_NO_PAD.encode(issued_at.to_be_bytes());

        let signing_input = format!("{body}.{stamp}");
        let mut mac = self.mac(salt)?;
        mac.update(signing_input.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{signing_input}.{signature}"))
    }

    /// Check signature, then age, then decode the payload.
    ///
    /// A token exactly `max_age` old is still accepted.
    pub fn verify<T: DeserializeOwned>(
        &self,
        token: &str,
        salt: &str,
        max_age: Duration,
    ) -> Result<T, TokenError> {
        let (body, stamp, signature) = split(token).ok_or(TokenError::InvalidSignature)?;

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| TokenError::InvalidSignature)?;
        let mut mac = self.mac(salt)?;
        mac.update(body.as_bytes());
        mac.update(b".");
        mac.update(stamp.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::InvalidSignature)?;

        let issued_at = decode_timestamp(stamp).ok_or(TokenError::InvalidSignature)?;
        let age_secs = self.clock.now().timestamp() - issued_at;
        let max_age_secs = max_age.as_secs();
        if age_secs < 0 || age_secs as u64 > max_age_secs {
            return Err(TokenError::Expired {
                age_secs,
                max_age_secs,
            });
        }

        let raw = URL_SAFE_NO_PAD
            .decode(body)
            .map_err(|_| TokenError::InvalidSignature)?;
        serde_json::from_slice(&raw).map_err(|_| TokenError::InvalidSignature)
    }

    /// Issue time of a well-formed token, without checking its signature
    pub fn issued_at(token: &str) -> Option<i64> {
        split(token).and_then(|(_, stamp, _)| decode_timestamp(stamp))
    }

    /// Stable identifier of a token (its signature segment)
    pub fn token_id(token: &str) -> Option<&str> {
        split(token).map(|(_, _, signature)| signature)
    }

    fn mac(&self, salt: &str) -> Result<HmacSha256, TokenError> {
        // Per-salt key: HMAC(secret, salt)
        let mut derive =
            HmacSha256::new_from_slice(self.secret.as_slice()).map_err(|_| TokenError::Key)?;
        derive.update(salt.as_bytes());
        let key = derive.finalize().into_bytes();
        HmacSha256::new_from_slice(&key).map_err(|_| TokenError::Key)
    }
}

fn split(token: &str) -> Option<(&str, &str, &str)> {
    let mut parts = token.trim().split('.');
    let body = parts.next()?;
    let stamp = parts.next()?;
    let signature = parts.next()?;
    if parts.next().is_some() || body.is_empty() || stamp.is_empty() || signature.is_empty() {
        return None;
    }
    Some((body, stamp, signature))
}

fn decode_timestamp(stamp: &str) -> Option<i64> {
    let bytes: [u8; 8] = URL_SAFE_NO_PAD.decode(stamp).ok()?.try_into().ok()?;
    i64::try_from(u64::from_be_bytes(bytes)).ok()
}
