//! HTTP collaborator.
//!
//! The core only needs JSON POST and GET with an explicit per-call timeout.
//! Non-2xx responses are errors. Nothing here retries; callers wrap calls in
//! a [`RetryPolicy`](crate::resilience::RetryPolicy) when they want one.

use crate::error::{AlertError, AlertResult};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn post_json(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: &Value,
        timeout: Duration,
    ) -> AlertResult<Value>;

    async fn get_json(&self, url: &str, timeout: Duration) -> AlertResult<Value>;
}

#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: Client,
}

impl ReqwestHttpClient {
    pub fn new() -> AlertResult<Self> {
        let client = Client::builder()
            .user_agent(format!("jjz-alert/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AlertError::Configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    async fn read_response(response: reqwest::Response) -> AlertResult<Value> {
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AlertError::Network(format!("failed to read response body: {e}")))?;

        if !status.is_success() {
            return Err(AlertError::api_status(
                format!("HTTP {}: {}", status.as_u16(), truncate(&text, 200)),
                status.as_u16(),
            ));
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        // Some endpoints answer 2xx with plain text
        Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
    }
}

fn map_send_error(url: &str, timeout: Duration, error: reqwest::Error) -> AlertError {
    if error.is_timeout() {
        AlertError::Network(format!(
            "request to {url} timed out after {}s",
            timeout.as_secs()
        ))
    } else {
        AlertError::Network(format!("request to {url} failed: {error}"))
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn post_json(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: &Value,
        timeout: Duration,
    ) -> AlertResult<Value> {
        debug!(url, timeout_secs = timeout.as_secs(), "POST");
        let mut request = self.client.post(url).timeout(timeout).json(body);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request
            .send()
            .await
            .map_err(|e| map_send_error(url, timeout, e))?;
        Self::read_response(response).await
    }

    async fn get_json(&self, url: &str, timeout: Duration) -> AlertResult<Value> {
        debug!(url, timeout_secs = timeout.as_secs(), "GET");
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| map_send_error(url, timeout, e))?;
        Self::read_response(response).await
    }
}
