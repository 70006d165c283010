//! Request handlers for the five public endpoints.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::HeaderMap;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::access::access_code_ok;
use crate::crypto::peppered_digest;
use crate::error::GatewayError;
use crate::phone::normalize_phone;
use crate::providers::{ChatMessage, ChatRole, complete_with_continuation, parse_reply_markers};

use super::AppState;

#[derive(Debug, Deserialize)]
pub(super) struct ChatBody {
    messages: Vec<ChatMessage>,
    #[serde(default)]
    intent: Option<String>,
    #[serde(default, rename = "userContext")]
    user_context: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct AuthRequestBody {
    phone: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct AuthVerifyBody {
    phone: String,
    code: String,
}

/// POST / — the chat endpoint. Session gate, access-code gate and rate
/// limiter run in that order, then the provider call with one continuation
/// retry and marker extraction.
pub(super) async fn handle_chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<ChatBody>, JsonRejection>,
) -> Result<Json<Value>, GatewayError> {
    let Json(body) = body.map_err(|e| GatewayError::BadRequest(e.to_string()))?;
    if body.messages.is_empty() {
        return Err(GatewayError::BadRequest("messages[] is required".into()));
    }

    if state.require_session {
        let valid = header_value(&headers, "x-session-token")
            .and_then(|token| state.sessions.verify(token))
            .is_some();
        if !valid {
            return Err(GatewayError::Unauthorized);
        }
    }

    if !access_code_ok(&state.access_codes, header_value(&headers, "x-access-code")) {
        return Err(GatewayError::Unauthorized);
    }

    let decision = state.limiter.check(&client_key(&headers));
    if decision.limited {
        return Err(GatewayError::RateLimited {
            retry_after_secs: decision.retry_after_secs,
        });
    }

    let system_prompt = assemble_system_prompt(&body);
    let turns: Vec<ChatMessage> = body
        .messages
        .into_iter()
        .filter(|m| m.role != ChatRole::System)
        .collect();

    let raw = complete_with_continuation(
        state.provider.as_ref(),
        system_prompt.as_deref(),
        &turns,
        &state.call_opts,
    )
    .await
    .map_err(|e| GatewayError::Upstream(e.to_string()))?;

    let (text, directives) = parse_reply_markers(&raw);

    let mut reply = json!({ "text": text });
    if let (Value::Object(map), Value::Object(extra)) =
        (&mut reply, serde_json::to_value(&directives).unwrap_or(json!({})))
    {
        map.extend(extra);
    }
    Ok(Json(reply))
}

/// POST /auth/request — start an OTP challenge for a phone number.
pub(super) async fn handle_auth_request(
    State(state): State<AppState>,
    body: Result<Json<AuthRequestBody>, JsonRejection>,
) -> Result<Json<Value>, GatewayError> {
    let Json(body) = body.map_err(|e| GatewayError::BadRequest(e.to_string()))?;
    let phone = normalize_phone(&body.phone)
        .ok_or_else(|| GatewayError::BadRequest("invalid phone number".into()))?;

    let phone_hash = peppered_digest(&[&phone], &state.phone_pepper);
    state.otp.request_challenge(&phone_hash, &phone).await?;
    Ok(Json(json!({ "ok": true })))
}

/// POST /auth/verify — check the submitted code and mint a session token.
pub(super) async fn handle_auth_verify(
    State(state): State<AppState>,
    body: Result<Json<AuthVerifyBody>, JsonRejection>,
) -> Result<Json<Value>, GatewayError> {
    let Json(body) = body.map_err(|e| GatewayError::BadRequest(e.to_string()))?;
    let phone = normalize_phone(&body.phone)
        .ok_or_else(|| GatewayError::BadRequest("invalid phone number".into()))?;

    let phone_hash = peppered_digest(&[&phone], &state.phone_pepper);
    state.otp.verify_challenge(&phone_hash, &body.code).await?;

    let issued = state.sessions.issue(&phone_hash)?;
    Ok(Json(json!({
        "ok": true,
        "token": issued.token,
        "exp": issued.exp,
    })))
}

/// GET /health — liveness probe; names the active provider, never secrets.
pub(super) async fn handle_health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "ok": true, "provider": state.provider.name() }))
}

/// GET /models — the active provider's model listing, passed through
/// verbatim.
pub(super) async fn handle_models(
    State(state): State<AppState>,
) -> Result<Json<Value>, GatewayError> {
    let listing = state
        .provider
        .list_models()
        .await
        .map_err(|e| GatewayError::Upstream(e.to_string()))?;
    Ok(Json(listing))
}

fn header_value<'h>(headers: &'h HeaderMap, name: &str) -> Option<&'h str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Rate-limit key: the first hop of x-forwarded-for when present, else a
/// shared bucket for direct connections.
fn client_key(headers: &HeaderMap) -> String {
    header_value(headers, "x-forwarded-for")
        .and_then(|list| list.split(',').next())
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
        .unwrap_or_else(|| "local".to_string())
}

/// Fold inline system turns plus the optional intent and user-context hints
/// into one system prompt.
fn assemble_system_prompt(body: &ChatBody) -> Option<String> {
    let mut sections: Vec<String> = body
        .messages
        .iter()
        .filter(|m| m.role == ChatRole::System)
        .map(|m| m.content.clone())
        .collect();

    if let Some(intent) = body.intent.as_deref().filter(|s| !s.trim().is_empty()) {
        sections.push(format!("Intento rilevato: {}", intent.trim()));
    }
    if let Some(ctx) = body.user_context.as_deref().filter(|s| !s.trim().is_empty()) {
        sections.push(format!("Contesto utente: {}", ctx.trim()));
    }

    if sections.is_empty() {
        None
    } else {
        Some(sections.join("\n\n"))
    }
}
