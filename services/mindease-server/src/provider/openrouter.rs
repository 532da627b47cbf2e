//! OpenRouter provider.
//!
//! OpenRouter exposes an OpenAI-compatible chat completions endpoint in front
//! of many model vendors.

use super::{ChatRequest, ChatResponse, Provider, ProviderError};
use crate::conversation::Message;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

const PROVIDER_NAME: &str = "openrouter";

/// OpenRouter chat completions client.
pub struct OpenRouterProvider {
    api_key: String,
    base_url: String,
    client: Client,
}

#[derive(Debug, Serialize)]
struct OpenRouterRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct OpenRouterResponse {
    #[serde(default)]
    choices: Vec<OpenRouterChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenRouterChoice {
    message: OpenRouterResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenRouterResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenRouterProvider {
    /// Create a provider. `timeout` bounds each request end to end.
    pub fn new(api_key: impl Into<String>, base_url: &str, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Falling back to default HTTP client");
                Client::new()
            });

        Self {
            api_key: api_key.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl Provider for OpenRouterProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError> {
        let start = Instant::now();

        let body = OpenRouterRequest {
            model: &request.model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                let kind = if e.is_timeout() { "Request timed out" } else { "Request failed" };
                ProviderError::new(PROVIDER_NAME, &request.model, format!("{kind}: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ProviderError::new(
                PROVIDER_NAME,
                &request.model,
                format!("API error ({}): {}", status.as_u16(), error_text),
            )
            .with_status(status.as_u16()));
        }

        let result: OpenRouterResponse = response.json().await.map_err(|e| {
            ProviderError::new(
                PROVIDER_NAME,
                &request.model,
                format!("Failed to parse response: {e}"),
            )
        })?;

        let choice = result.choices.into_iter().next().ok_or_else(|| {
            ProviderError::new(PROVIDER_NAME, &request.model, "No choices in response")
        })?;

        Ok(ChatResponse {
            provider: PROVIDER_NAME.into(),
            model: request.model,
            content: choice.message.content,
            finish_reason: choice.finish_reason,
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }
}
