//! Short-lived, single-use OTP challenges bound to a hashed phone identity.
//!
//! Only the phone hash ever reaches storage. A challenge stores
//! `sha256(phoneHash|code|pepper)`; the code itself exists only in the SMS.
//! The allow-list check, the cooldown check and the subsequent writes are
//! not transactional — two near-simultaneous requests can both pass the
//! cooldown. Accepted: the worst outcome is one extra SMS.

use std::sync::Arc;

use rand::Rng;

use crate::crypto::peppered_digest;
use crate::error::GatewayError;
use crate::kv::KvStore;
use crate::sms::SmsSender;

/// Fixed cooldown between challenge requests for one phone identity.
const COOLDOWN_SECS: u64 = 60;

pub struct OtpService {
    kv: Arc<dyn KvStore>,
    sms: Option<Arc<dyn SmsSender>>,
    pepper: String,
    ttl_secs: u64,
    /// Static fallback when no allow-list entries live in the KV store.
    fallback_allowlist: Vec<String>,
}

impl OtpService {
    pub fn new(
        kv: Arc<dyn KvStore>,
        sms: Option<Arc<dyn SmsSender>>,
        pepper: String,
        ttl_secs: u64,
        fallback_allowlist: Vec<String>,
    ) -> Self {
        Self {
            kv,
            sms,
            pepper,
            ttl_secs,
            fallback_allowlist,
        }
    }

    /// Generate and dispatch a challenge for an allow-listed phone identity.
    ///
    /// A phone that is unknown and a phone that is known but not allowed are
    /// rejected identically, so callers cannot probe which numbers are
    /// provisioned.
    pub async fn request_challenge(
        &self,
        phone_hash: &str,
        to_e164: &str,
    ) -> Result<(), GatewayError> {
        if !self.is_allowlisted(phone_hash).await? {
            return Err(GatewayError::NotProvisioned);
        }

        let cooldown_key = format!("otp_req:{phone_hash}");
        let on_cooldown = self
            .kv
            .get(&cooldown_key)
            .await
            .map_err(|e| GatewayError::Upstream(e.to_string()))?
            .is_some();
        if on_cooldown {
            return Err(GatewayError::RateLimited {
                retry_after_secs: COOLDOWN_SECS,
            });
        }

        let sms = self
            .sms
            .as_ref()
            .ok_or_else(|| GatewayError::Config("SMS credentials are not set".into()))?;

        let code = format!("{:05}", rand::rng().random_range(0..=99_999u32));
        let challenge = peppered_digest(&[phone_hash, &code], &self.pepper);

        self.kv
            .put(&format!("otp:{phone_hash}"), &challenge, self.ttl_secs)
            .await
            .map_err(|e| GatewayError::Upstream(e.to_string()))?;
        self.kv
            .put(&cooldown_key, "1", COOLDOWN_SECS)
            .await
            .map_err(|e| GatewayError::Upstream(e.to_string()))?;

        sms.send(to_e164, &format!("Codice di verifica: {code}"))
            .await
            .map_err(|e| GatewayError::Upstream(e.to_string()))?;

        tracing::info!("OTP challenge dispatched (ttl {}s)", self.ttl_secs);
        Ok(())
    }

    /// Check a submitted code against the stored challenge. Consumes the
    /// challenge on success; an expired, missing or mismatched challenge is
    /// reported uniformly as unauthorized.
    pub async fn verify_challenge(
        &self,
        phone_hash: &str,
        code: &str,
    ) -> Result<(), GatewayError> {
        if code.len() != 5 || !code.chars().all(|c| c.is_ascii_digit()) {
            return Err(GatewayError::BadRequest("code must be 5 digits".into()));
        }

        let challenge_key = format!("otp:{phone_hash}");
        let Some(stored) = self
            .kv
            .get(&challenge_key)
            .await
            .map_err(|e| GatewayError::Upstream(e.to_string()))?
        else {
            return Err(GatewayError::Unauthorized);
        };

        let presented = peppered_digest(&[phone_hash, code], &self.pepper);
        if !crate::crypto::constant_time_eq(&stored, &presented) {
            return Err(GatewayError::Unauthorized);
        }

        // Single-use: consume both the challenge and the cooldown marker.
        self.kv
            .delete(&challenge_key)
            .await
            .map_err(|e| GatewayError::Upstream(e.to_string()))?;
        self.kv
            .delete(&format!("otp_req:{phone_hash}"))
            .await
            .map_err(|e| GatewayError::Upstream(e.to_string()))?;

        Ok(())
    }

    async fn is_allowlisted(&self, phone_hash: &str) -> Result<bool, GatewayError> {
        let kv_entry = self
            .kv
            .get(&format!("allow:{phone_hash}"))
            .await
            .map_err(|e| GatewayError::Upstream(e.to_string()))?;
        if kv_entry.is_some() {
            return Ok(true);
        }
        Ok(self.fallback_allowlist.iter().any(|h| h == phone_hash))
    }
}
