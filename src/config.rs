//! Environment-driven configuration.
//!
//! The whole surface is read once at startup into the composition root.
//! Secrets (peppers, signing secret, provider keys) stay in this struct and
//! are never echoed by any endpoint.

use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    /// Active LLM provider: `openai`, `anthropic` or `gemini`.
    pub provider: String,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub anthropic_api_key: Option<String>,
    pub anthropic_model: String,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,

    pub max_tokens: u32,
    pub temperature: f64,

    /// `*` or a comma-separated origin allow-list.
    pub allowed_origin: String,
    pub rate_limit_max: u32,
    pub rate_limit_window_secs: u64,
    /// Shared access codes; empty disables the check.
    pub access_codes: Vec<String>,

    pub require_session: bool,
    pub session_secret: Option<String>,
    pub session_ttl_days: u64,

    pub phone_pepper: String,
    pub otp_pepper: String,
    pub otp_ttl_secs: u64,
    /// Static phone-hash allow-list used when the KV store has no entry.
    pub phone_allowlist: Vec<String>,

    pub kv_rest_url: Option<String>,
    pub kv_rest_token: Option<String>,

    pub twilio_account_sid: Option<String>,
    pub twilio_auth_token: Option<String>,
    pub twilio_from: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let get_or = |name: &str, default: &str| get(name).unwrap_or_else(|| default.to_string());
        let list = |name: &str| -> Vec<String> {
            get(name)
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default()
        };

        Self {
            provider: get("VARCO_PROVIDER")
                .or_else(|| get("PROVIDER"))
                .unwrap_or_else(|| "openai".into())
                .to_lowercase(),
            openai_api_key: get("OPENAI_API_KEY"),
            openai_model: get_or("OPENAI_MODEL", "gpt-4o-mini"),
            anthropic_api_key: get("ANTHROPIC_API_KEY"),
            anthropic_model: get_or("ANTHROPIC_MODEL", "claude-3-5-sonnet-latest"),
            gemini_api_key: get("GEMINI_API_KEY"),
            gemini_model: get_or("GEMINI_MODEL", "gemini-1.5-flash"),

            max_tokens: parse_or(get("VARCO_MAX_TOKENS"), 260),
            temperature: parse_or(get("VARCO_TEMPERATURE"), 0.6),

            allowed_origin: get_or("ALLOWED_ORIGIN", "*"),
            rate_limit_max: parse_or(get("RATE_LIMIT_MAX"), 20),
            rate_limit_window_secs: parse_or(get("RATE_LIMIT_WINDOW_SECS"), 60),
            access_codes: list("ACCESS_CODES"),

            require_session: get("REQUIRE_SESSION")
                .is_some_and(|v| matches!(v.as_str(), "1" | "true" | "yes")),
            session_secret: get("SESSION_SECRET"),
            session_ttl_days: parse_or(get("SESSION_TTL_DAYS"), 30),

            phone_pepper: get_or("PHONE_PEPPER", ""),
            otp_pepper: get_or("OTP_PEPPER", ""),
            otp_ttl_secs: parse_or(get("OTP_TTL_SECS"), 600),
            phone_allowlist: list("PHONE_ALLOWLIST"),

            kv_rest_url: get("KV_REST_URL"),
            kv_rest_token: get("KV_REST_TOKEN"),

            twilio_account_sid: get("TWILIO_ACCOUNT_SID"),
            twilio_auth_token: get("TWILIO_AUTH_TOKEN"),
            twilio_from: get("TWILIO_FROM"),
        }
    }
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Config {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Config::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn defaults_apply_with_empty_environment() {
        let c = config_from(&[]);
        assert_eq!(c.provider, "openai");
        assert_eq!(c.openai_model, "gpt-4o-mini");
        assert_eq!(c.max_tokens, 260);
        assert_eq!(c.allowed_origin, "*");
        assert_eq!(c.rate_limit_max, 20);
        assert_eq!(c.session_ttl_days, 30);
        assert_eq!(c.otp_ttl_secs, 600);
        assert!(!c.require_session);
        assert!(c.access_codes.is_empty());
    }

    #[test]
    fn provider_falls_back_to_generic_var() {
        let c = config_from(&[("PROVIDER", "Anthropic")]);
        assert_eq!(c.provider, "anthropic");
        let c = config_from(&[("VARCO_PROVIDER", "gemini"), ("PROVIDER", "openai")]);
        assert_eq!(c.provider, "gemini");
    }

    #[test]
    fn lists_split_on_commas_and_drop_blanks() {
        let c = config_from(&[("ACCESS_CODES", "alpha, beta,,  gamma ")]);
        assert_eq!(c.access_codes, vec!["alpha", "beta", "gamma"]);
    }

    #[test]
    fn require_session_accepts_truthy_spellings() {
        for v in ["1", "true", "yes"] {
            assert!(config_from(&[("REQUIRE_SESSION", v)]).require_session);
        }
        for v in ["0", "false", "no", "off"] {
            assert!(!config_from(&[("REQUIRE_SESSION", v)]).require_session);
        }
    }

    #[test]
    fn numeric_garbage_falls_back_to_default() {
        let c = config_from(&[("RATE_LIMIT_MAX", "lots")]);
        assert_eq!(c.rate_limit_max, 20);
    }

    #[test]
    fn blank_values_count_as_unset() {
        let c = config_from(&[("OPENAI_API_KEY", "   ")]);
        assert!(c.openai_api_key.is_none());
    }
}
