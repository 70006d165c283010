//! Messages-style adapter: the system prompt travels as a top-level field,
//! only user/assistant turns are forwarded, and the reply text is the
//! concatenation of text-typed content blocks.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::http::{api_error, build_provider_client};
use super::traits::{CallOptions, ChatMessage, ChatProvider, ChatRole};

const API_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    api_key: String,
    messages_url: String,
    models_url: String,
    client: Client,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    max_tokens: u32,
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<WireMessage>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    content: Vec<ResponseBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseBlock {
    Text { text: String },
    #[serde(other)]
    Unsupported,
}

impl AnthropicProvider {
    pub fn new(api_key: &str) -> Self {
        Self::with_base_url(api_key, "https://api.anthropic.com")
    }

    pub fn with_base_url(api_key: &str, base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            api_key: api_key.trim().to_string(),
            messages_url: format!("{base}/v1/messages"),
            models_url: format!("{base}/v1/models"),
            client: build_provider_client(),
        }
    }

    fn build_request(
        system_prompt: Option<&str>,
        messages: &[ChatMessage],
        opts: &CallOptions,
    ) -> ChatRequest {
        let wire = messages
            .iter()
            .filter_map(|m| match m.role {
                ChatRole::User => Some(WireMessage {
                    role: "user",
                    content: m.content.clone(),
                }),
                ChatRole::Assistant => Some(WireMessage {
                    role: "assistant",
                    content: m.content.clone(),
                }),
                // System turns travel in the dedicated top-level field.
                ChatRole::System => None,
            })
            .collect();

        ChatRequest {
            model: opts.model.clone(),
            max_tokens: opts.max_tokens,
            temperature: opts.temperature,
            system: system_prompt.map(ToString::to_string),
            messages: wire,
        }
    }

    fn extract_text(response: &ChatResponse) -> String {
        response
            .content
            .iter()
            .filter_map(|block| match block {
                ResponseBlock::Text { text } => Some(text.as_str()),
                ResponseBlock::Unsupported => None,
            })
            .collect::<Vec<_>>()
            .join("")
            .trim()
            .to_string()
    }
}

#[async_trait]
impl ChatProvider for AnthropicProvider {
    fn name(&self) -> &'static str {
        "anthropic"
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
            .post(&self.messages_url)
            .timeout(opts.timeout)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error("Anthropic", response).await);
        }

        let parsed: ChatResponse = response.json().await?;
        Ok(Self::extract_text(&parsed))
    }

    async fn list_models(&self) -> anyhow::Result<serde_json::Value> {
        let response = self
            .client
            .get(&self.models_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(api_error("Anthropic", response).await);
        }
        Ok(response.json().await?)
    }
}
