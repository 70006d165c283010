//! Self-contained bearer credentials for verified sessions.
//!
//! A token is `base64url(payload) + "." + base64url(hmac_sha256(payload))`
//! where the payload is compact JSON `{v, sub, iat, exp}`. Verification is
//! uniform: every failure path yields `None`, and the signature is checked
//! over the received payload bytes before anything in the payload is
//! trusted.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::crypto::{b64url_decode, b64url_encode, hmac_sign, hmac_verify};
use crate::error::GatewayError;

const TOKEN_VERSION: u8 = 1;
const SECS_PER_DAY: u64 = 86_400;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub v: u8,
    /// Phone hash — never the raw number.
    pub sub: String,
    pub iat: u64,
    pub exp: u64,
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub exp: u64,
}

pub struct SessionKeeper {
    secret: Option<String>,
    ttl_days: u64,
}

impl SessionKeeper {
    pub fn new(secret: Option<String>, ttl_days: u64) -> Self {
        Self { secret, ttl_days }
    }

    /// Issue a signed session token for a verified phone hash.
    ///
    /// A missing signing secret is a fatal configuration error — an
    /// unsigned token would be forgeable by anyone.
    pub fn issue(&self, phone_hash: &str) -> Result<IssuedToken, GatewayError> {
        self.issue_at(phone_hash, unix_now())
    }

    fn issue_at(&self, phone_hash: &str, now: u64) -> Result<IssuedToken, GatewayError> {
        let secret = self
            .secret
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| GatewayError::Config("SESSION_SECRET is not set".into()))?;

        let claims = SessionClaims {
            v: TOKEN_VERSION,
            sub: phone_hash.to_string(),
            iat: now,
            exp: now + self.ttl_days * SECS_PER_DAY,
        };
        let payload =
            serde_json::to_vec(&claims).map_err(|e| GatewayError::Config(e.to_string()))?;
        let signature = hmac_sign(secret, &payload);

        Ok(IssuedToken {
            token: format!("{}.{}", b64url_encode(&payload), b64url_encode(&signature)),
            exp: claims.exp,
        })
    }

    /// Verify a presented token. Returns the claims only when the signature
    /// validates and the expiry is strictly in the future; every rejection
    /// is reported identically.
    pub fn verify(&self, token: &str) -> Option<SessionClaims> {
        self.verify_at(token, unix_now())
    }

    fn verify_at(&self, token: &str, now: u64) -> Option<SessionClaims> {
        let secret = self.secret.as_deref().filter(|s| !s.is_empty())?;

        let (payload_b64, signature_b64) = token.split_once('.')?;
        if payload_b64.is_empty() || signature_b64.is_empty() || signature_b64.contains('.') {
            return None;
        }

        let payload = b64url_decode(payload_b64)?;
        let signature = b64url_decode(signature_b64)?;
        if !hmac_verify(secret, &payload, &signature) {
            return None;
        }

        let claims: SessionClaims = serde_json::from_slice(&payload).ok()?;
        if claims.exp <= now {
            return None;
        }
        Some(claims)
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
