//! Gateway error taxonomy and its HTTP mapping.
//!
//! Authorization failures are deliberately vague: the response body never
//! says which check failed. Upstream and configuration failures keep their
//! detail for operator logs but the caller only sees a sanitized message.

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Malformed JSON, invalid phone or code shape. Safe to show the reason.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Bad/missing/expired token, wrong access code, OTP mismatch.
    #[error("unauthorized")]
    Unauthorized,

    /// Cross-origin caller not on the allow-list.
    #[error("origin not allowed")]
    OriginDenied,

    /// Phone not on the allow-list, or not found at all. The two cases are
    /// reported identically so callers cannot probe which numbers exist.
    #[error("not provisioned")]
    NotProvisioned,

    #[error("rate limited (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    /// SMS or LLM provider failure, timeout included. Not the caller's fault.
    #[error("upstream: {0}")]
    Upstream(String),

    /// Missing signing secret, missing API key. Must never degrade into
    /// "pretend it worked".
    #[error("configuration: {0}")]
    Config(String),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::OriginDenied => StatusCode::FORBIDDEN,
            Self::NotProvisioned => StatusCode::NOT_FOUND,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Upstream(_) | Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message the caller is allowed to see.
    fn public_message(&self) -> String {
        match self {
            Self::BadRequest(reason) => reason.clone(),
            Self::Unauthorized => "unauthorized".into(),
            Self::OriginDenied => "origin not allowed".into(),
            Self::NotProvisioned => "not found".into(),
            Self::RateLimited { retry_after_secs } => {
                format!("rate limited, retry in {retry_after_secs}s")
            }
            Self::Upstream(detail) => format!("upstream error: {detail}"),
            Self::Config(_) => "server misconfigured".into(),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        match &self {
            GatewayError::Upstream(detail) => tracing::error!("upstream failure: {detail}"),
            GatewayError::Config(detail) => tracing::error!("configuration error: {detail}"),
            GatewayError::RateLimited { retry_after_secs } => {
                tracing::warn!("rate limited client (retry after {retry_after_secs}s)");
            }
            _ => {}
        }

        let status = self.status();
        let body = Json(serde_json::json!({ "error": self.public_message() }));
        let mut response = (status, body).into_response();

        if let GatewayError::RateLimited { retry_after_secs } = self
            && let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string())
        {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }

        response
    }
}
