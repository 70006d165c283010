//! Outbound SMS delivery.
//!
//! The gateway only ever sends one kind of message (an OTP code), so the
//! seam is a single `send`. Twilio is the production transport; tests use
//! `RecordingSms`.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

#[async_trait]
pub trait SmsSender: Send + Sync {
    async fn send(&self, to_e164: &str, body: &str) -> anyhow::Result<()>;
}

// ── Twilio transport ──────────────────────────────────────────────

pub struct TwilioSms {
    account_sid: String,
    auth_token: String,
    from: String,
    messages_url: String,
    client: Client,
}

impl TwilioSms {
    pub fn new(account_sid: &str, auth_token: &str, from: &str) -> Self {
        Self::with_base_url(account_sid, auth_token, from, "https://api.twilio.com")
    }

    pub fn with_base_url(account_sid: &str, auth_token: &str, from: &str, base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            account_sid: account_sid.to_string(),
            auth_token: auth_token.to_string(),
            from: from.to_string(),
            messages_url: format!("{base}/2010-04-01/Accounts/{account_sid}/Messages.json"),
            client: Client::builder()
                .timeout(Duration::from_secs(10))
                .connect_timeout(Duration::from_secs(5))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }
}

#[async_trait]
impl SmsSender for TwilioSms {
    async fn send(&self, to_e164: &str, body: &str) -> anyhow::Result<()> {
        let response = self
            .client
            .post(&self.messages_url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[("To", to_e164), ("From", self.from.as_str()), ("Body", body)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            anyhow::bail!("SMS provider error ({status}): {detail}");
        }
        Ok(())
    }
}

// ── Test fake ─────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSms {
    pub sent: Mutex<Vec<(String, String)>>,
}

impl RecordingSms {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent_count(&self) -> usize {
        self.sent
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl SmsSender for RecordingSms {
    async fn send(&self, to_e164: &str, body: &str) -> anyhow::Result<()> {
        self.sent
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push((to_e164.to_string(), body.to_string()));
        Ok(())
    }
}
