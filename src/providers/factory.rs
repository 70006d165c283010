use std::sync::Arc;

use crate::config::Config;
use crate::error::GatewayError;

use super::anthropic::AnthropicProvider;
use super::gemini::GeminiProvider;
use super::openai::OpenAiProvider;
use super::traits::ChatProvider;

/// Build the configured provider adapter. A missing API key for the
/// selected provider is a fatal configuration error, never a silent
/// degradation.
pub fn create_provider(config: &Config) -> Result<Arc<dyn ChatProvider>, GatewayError> {
    let require_key = |key: &Option<String>, var: &str| {
        key.clone()
            .ok_or_else(|| GatewayError::Config(format!("{var} is not set")))
    };

    match config.provider.as_str() {
        "openai" => {
            let key = require_key(&config.openai_api_key, "OPENAI_API_KEY")?;
            Ok(Arc::new(OpenAiProvider::new(&key)))
        }
        "anthropic" => {
            let key = require_key(&config.anthropic_api_key, "ANTHROPIC_API_KEY")?;
            Ok(Arc::new(AnthropicProvider::new(&key)))
        }
        "gemini" => {
            let key = require_key(&config.gemini_api_key, "GEMINI_API_KEY")?;
            Ok(Arc::new(GeminiProvider::new(&key)))
        }
        other => Err(GatewayError::Config(format!("unknown provider: {other}"))),
    }
}

/// The model name the active provider will be called with.
pub fn default_model(config: &Config) -> String {
    match config.provider.as_str() {
        "anthropic" => config.anthropic_model.clone(),
        "gemini" => config.gemini_model.clone(),
        _ => config.openai_model.clone(),
    }
}
