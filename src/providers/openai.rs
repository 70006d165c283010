//! Chat-completions adapter: messages pass through almost verbatim with the
//! system prompt prepended as a `system` role turn.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::http::{api_error, build_provider_client};
use super::traits::{CallOptions, ChatMessage, ChatProvider, ChatRole};

pub struct OpenAiProvider {
    /// Pre-computed `"Bearer <key>"` header value.
    auth_header: String,
    chat_url: String,
    models_url: String,
    client: Client,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<WireMessage>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl OpenAiProvider {
    pub fn new(api_key: &str) -> Self {
        Self::with_base_url(api_key, "https://api.openai.com")
    }

    pub fn with_base_url(api_key: &str, base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            auth_header: format!("Bearer {}", api_key.trim()),
            chat_url: format!("{base}/v1/chat/completions"),
            models_url: format!("{base}/v1/models"),
            client: build_provider_client(),
        }
    }

    fn wire_role(role: ChatRole) -> &'static str {
        match role {
            ChatRole::System => "system",
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }

    fn build_request(
        system_prompt: Option<&str>,
        messages: &[ChatMessage],
        opts: &CallOptions,
    ) -> ChatRequest {
        let mut wire = Vec::with_capacity(messages.len() + 1);
        if let Some(sys) = system_prompt {
            wire.push(WireMessage {
                role: "system",
                content: sys.to_string(),
            });
        }
        wire.extend(messages.iter().map(|m| WireMessage {
            role: Self::wire_role(m.role),
            content: m.content.clone(),
        }));

        ChatRequest {
            model: opts.model.clone(),
            messages: wire,
            temperature: opts.temperature,
            max_tokens: opts.max_tokens,
        }
    }
}

#[async_trait]
impl ChatProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn complete(
        &self,
        system_prompt: Option<&str>,
        messages: &[ChatMessage],
        opts: &CallOptions,
    ) -> anyhow::Result<String> {
        let request = Self::build_request(system_prompt, messages, opts);
        let response = self
            .client
            .post(&self.chat_url)
            .timeout(opts.timeout)
            .header("authorization", &self.auth_header)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error("OpenAI", response).await);
        }

        let parsed: ChatResponse = response.json().await?;
        let text = parsed
            .choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .unwrap_or_default()
            .trim()
            .to_string();
        Ok(text)
    }

    async fn list_models(&self) -> anyhow::Result<serde_json::Value> {
        let response = self
            .client
            .get(&self.models_url)
            .header("authorization", &self.auth_header)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(api_error("OpenAI", response).await);
        }
        Ok(response.json().await?)
    }
}
