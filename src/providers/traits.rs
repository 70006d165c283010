use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Chat turn role as accepted on the wire. Unknown roles fail JSON parsing
/// and surface as a client error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Per-call knobs shared by all adapters.
#[derive(Debug, Clone)]
pub struct CallOptions {
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    /// Outbound call budget; the request is aborted on expiry rather than
    /// left to hang.
    pub timeout: Duration,
}

impl CallOptions {
    /// Tighter budget for the single continuation retry.
    pub fn for_continuation(&self) -> Self {
        Self {
            timeout: self.timeout / 2,
            ..self.clone()
        }
    }
}

/// One upstream chat adapter. Adding a provider means adding one
/// implementation, not branching existing code.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Transform the normalized request into the provider's wire format,
    /// call it, and give back plain text.
    async fn complete(
        &self,
        system_prompt: Option<&str>,
        messages: &[ChatMessage],
        opts: &CallOptions,
    ) -> anyhow::Result<String>;

    /// Diagnostic passthrough of the provider's model listing.
    async fn list_models(&self) -> anyhow::Result<serde_json::Value>;
}

impl std::fmt::Debug for dyn ChatProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatProvider")
            .field("name", &self.name())
            .finish()
    }
}
