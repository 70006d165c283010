//! Generative-content adapter: system instruction travels as a structured
//! field, assistant turns are relabeled `model`, and model availability
//! differs by API version — a 404 on the primary versioned endpoint is
//! retried once against the alternate version.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use super::http::{api_error, build_provider_client};
use super::traits::{CallOptions, ChatMessage, ChatProvider, ChatRole};

const PRIMARY_VERSION: &str = "v1beta";
const FALLBACK_VERSION: &str = "v1";

pub struct GeminiProvider {
    api_key: String,
    base_url: String,
    client: Client,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f64,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GeminiProvider {
    pub fn new(api_key: &str) -> Self {
        Self::with_base_url(api_key, "https://generativelanguage.googleapis.com")
    }

    pub fn with_base_url(api_key: &str, base_url: &str) -> Self {
        Self {
            api_key: api_key.trim().to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            client: build_provider_client(),
        }
    }

    fn generate_url(&self, version: &str, model: &str) -> String {
        format!(
            "{}/{version}/models/{model}:generateContent?key={}",
            self.base_url, self.api_key
        )
    }

    fn build_request(
        system_prompt: Option<&str>,
        messages: &[ChatMessage],
        opts: &CallOptions,
    ) -> GenerateContentRequest {
        let contents = messages
            .iter()
            .filter_map(|m| {
                let role = match m.role {
                    ChatRole::User => "user",
                    ChatRole::Assistant => "model",
                    ChatRole::System => return None,
                };
                Some(Content {
                    role: Some(role),
                    parts: vec![Part {
                        text: m.content.clone(),
                    }],
                })
            })
            .collect();

        GenerateContentRequest {
            system_instruction: system_prompt.map(|sys| Content {
                role: None,
                parts: vec![Part {
                    text: sys.to_string(),
                }],
            }),
            contents,
            generation_config: GenerationConfig {
                temperature: opts.temperature,
                max_output_tokens: opts.max_tokens,
            },
        }
    }

    fn extract_text(response: &GenerateContentResponse) -> String {
        response
            .candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default()
            .trim()
            .to_string()
    }

    async fn call_version(
        &self,
        version: &str,
        request: &GenerateContentRequest,
        opts: &CallOptions,
    ) -> anyhow::Result<reqwest::Response> {
        Ok(self
            .client
            .post(self.generate_url(version, &opts.model))
            .timeout(opts.timeout)
            .json(request)
            .send()
            .await?)
    }
}

#[async_trait]
impl ChatProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn complete(
        &self,
        system_prompt: Option<&str>,
        messages: &[ChatMessage],
        opts: &CallOptions,
    ) -> anyhow::Result<String> {
        let request = Self::build_request(system_prompt, messages, opts);

        let mut response = self.call_version(PRIMARY_VERSION, &request, opts).await?;
        if response.status() == StatusCode::NOT_FOUND {
            // Model not served under this API version; try the alternate once.
            tracing::info!(
                model = %opts.model,
                "model not found on {PRIMARY_VERSION}, retrying on {FALLBACK_VERSION}"
            );
            response = self.call_version(FALLBACK_VERSION, &request, opts).await?;
        }

        if !response.status().is_success() {
            return Err(api_error("Gemini", response).await);
        }

        let parsed: GenerateContentResponse = response.json().await?;
        Ok(Self::extract_text(&parsed))
    }

    async fn list_models(&self) -> anyhow::Result<serde_json::Value> {
        let url = format!(
            "{}/{PRIMARY_VERSION}/models?key={}",
            self.base_url, self.api_key
        );
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(api_error("Gemini", response).await);
        }
        Ok(response.json().await?)
    }
}
