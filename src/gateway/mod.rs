//! Axum-based HTTP gateway: the composition root wiring the access gate,
//! rate limiter, OTP/session subsystem and provider router into one
//! request/response cycle.
//!
//! Every branch terminates in exactly one status + body; CORS headers are
//! attached by middleware so even rejected requests stay readable from a
//! browser.

mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::extract::{Request, State};
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

use crate::access::{OriginDecision, OriginPolicy};
use crate::config::Config;
use crate::error::GatewayError;
use crate::kv::{KvStore, MemoryKv, RestKv};
use crate::otp::OtpService;
use crate::providers::{self, CallOptions, ChatProvider};
use crate::ratelimit::RateLimiter;
use crate::sms::{SmsSender, TwilioSms};
use crate::token::SessionKeeper;

use handlers::{handle_auth_request, handle_auth_verify, handle_chat, handle_health, handle_models};

/// Maximum request body size (64 KiB).
pub const MAX_BODY_SIZE: usize = 65_536;
/// Whole-request timeout; the primary provider call gets half of it.
pub const REQUEST_TIMEOUT_SECS: u64 = 60;

const CORS_METHODS: &str = "GET, POST, OPTIONS";
const CORS_HEADERS: &str = "Content-Type, x-access-code, x-session-token";

/// Shared state for all axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub provider: Arc<dyn ChatProvider>,
    pub call_opts: CallOptions,
    pub limiter: Arc<RateLimiter>,
    pub otp: Arc<OtpService>,
    pub sessions: Arc<SessionKeeper>,
    pub origins: OriginPolicy,
    pub access_codes: Arc<Vec<String>>,
    pub require_session: bool,
    pub phone_pepper: Arc<str>,
}

/// Assemble the application state from configuration.
pub fn build_state(config: &Config) -> Result<AppState, GatewayError> {
    let provider = providers::create_provider(config)?;
    let model = providers::default_model(config);

    let kv: Arc<dyn KvStore> = match (&config.kv_rest_url, &config.kv_rest_token) {
        (Some(url), Some(token)) => Arc::new(RestKv::new(url, token)),
        _ => {
            tracing::warn!("no KV store configured, OTP state is process-local");
            Arc::new(MemoryKv::new())
        }
    };

    let sms: Option<Arc<dyn SmsSender>> = match (
        &config.twilio_account_sid,
        &config.twilio_auth_token,
        &config.twilio_from,
    ) {
        (Some(sid), Some(token), Some(from)) => Some(Arc::new(TwilioSms::new(sid, token, from))),
        _ => None,
    };

    let otp = Arc::new(OtpService::new(
        kv,
        sms,
        config.otp_pepper.clone(),
        config.otp_ttl_secs,
        config.phone_allowlist.clone(),
    ));

    Ok(AppState {
        provider,
        call_opts: CallOptions {
            model,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS / 2),
        },
        limiter: Arc::new(RateLimiter::new(
            config.rate_limit_max,
            Duration::from_secs(config.rate_limit_window_secs),
        )),
        otp,
        sessions: Arc::new(SessionKeeper::new(
            config.session_secret.clone(),
            config.session_ttl_days,
        )),
        origins: OriginPolicy::parse(&config.allowed_origin),
        access_codes: Arc::new(config.access_codes.clone()),
        require_session: config.require_session,
        phone_pepper: Arc::from(config.phone_pepper.as_str()),
    })
}

/// Build the router with all routes and layers.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", post(handle_chat))
        .route("/auth/request", post(handle_auth_request))
        .route("/auth/verify", post(handle_auth_verify))
        .route("/health", get(handle_health))
        .route("/models", get(handle_models))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(REQUEST_TIMEOUT_SECS),
        ))
        .layer(middleware::from_fn_with_state(state.clone(), cors_gate))
        .with_state(state)
}

/// Run the HTTP gateway.
pub async fn run_gateway(host: &str, port: u16, config: Config) -> Result<()> {
    let state = build_state(&config)?;
    let addr: SocketAddr = format!("{host}:{port}").parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!(
        "listening on {addr} (provider: {})",
        state.provider.name()
    );

    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// Resolve the CORS policy before any other processing. Disallowed
/// cross-origin calls never reach the handlers (or the rate limiter);
/// preflights are answered here.
async fn cors_gate(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let origin = request
        .headers()
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    let allow_origin = match state.origins.resolve(origin.as_deref()) {
        OriginDecision::Allowed(value) => Some(value),
        OriginDecision::NotBrowser => None,
        OriginDecision::Denied => {
            tracing::warn!("rejected cross-origin request");
            return GatewayError::OriginDenied.into_response();
        }
    };

    let mut response = if request.method() == Method::OPTIONS {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(request).await
    };

    if let Some(value) = allow_origin
        && let Ok(value) = HeaderValue::from_str(&value)
    {
        let headers = response.headers_mut();
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(CORS_METHODS),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(CORS_HEADERS),
        );
        headers.insert(header::VARY, HeaderValue::from_static("Origin"));
    }

    response
}
