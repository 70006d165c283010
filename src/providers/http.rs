use reqwest::Client;
use std::time::Duration;

/// Shared client shape for all provider adapters. Per-request budgets are
/// set on the request itself; this only bounds connect time and pooling.
pub fn build_provider_client() -> Client {
    Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// Build a provider error from a failed HTTP response, keeping the upstream
/// status and body for operator debugging.
pub async fn api_error(provider: &str, response: reqwest::Response) -> anyhow::Error {
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read provider error body>".to_string());
    let body = body.trim();
    let mut end = body.len().min(300);
    while end > 0 && !body.is_char_boundary(end) {
        end -= 1;
    }
    anyhow::anyhow!("{provider} error {}: {}", status.as_u16(), &body[..end])
}
