//! Completion client with bounded retries and a canned fallback.
//!
//! Each call makes up to `max_retries + 1` strictly sequential attempts with a
//! fixed delay between them. Provider errors and empty replies both count as
//! failed attempts. The client never returns an error: exhaustion yields
//! [`FALLBACK_REPLY`] and a missing credential yields [`NOT_CONFIGURED_REPLY`].

use crate::conversation::Message;
use crate::provider::{ChatRequest, OpenRouterProvider, Provider};
use mindease_common::config::{AiConfig, AiCredential};
use std::sync::Arc;
use std::time::Duration;

/// Reply when no API credential was configured at startup.
pub const NOT_CONFIGURED_REPLY: &str = "AI service is not configured properly.";

/// Reply when every attempt failed.
pub const FALLBACK_REPLY: &str = "I'm here with you, but I'm having trouble responding right now. \
Please try again in a moment.";

/// Retry and request parameters.
#[derive(Debug, Clone)]
pub struct CompletionSettings {
    pub model: String,
    pub temperature: f64,
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Fixed pause between attempts
    pub retry_delay: Duration,
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self {
            model: "openrouter/auto".into(),
            temperature: 0.7,
            max_retries: 2,
            retry_delay: Duration::from_millis(1000),
        }
    }
}

impl From<&AiConfig> for CompletionSettings {
    fn from(ai: &AiConfig) -> Self {
        Self {
            model: ai.model.clone(),
            temperature: ai.temperature,
            max_retries: ai.max_retries,
            retry_delay: Duration::from_millis(ai.retry_delay_ms),
        }
    }
}

/// Resilient front for a single provider.
#[derive(Clone)]
pub struct CompletionClient {
    provider: Option<Arc<dyn Provider>>,
    settings: CompletionSettings,
}

impl CompletionClient {
    /// Create a client. `None` means the service is not configured.
    pub fn new(provider: Option<Arc<dyn Provider>>, settings: CompletionSettings) -> Self {
        Self { provider, settings }
    }

    /// Build the OpenRouter-backed client from resolved configuration.
    pub fn from_config(credential: &AiCredential, ai: &AiConfig) -> Self {
        let provider = credential.key().map(|key| {
            Arc::new(OpenRouterProvider::new(
                key,
                &ai.base_url,
                Duration::from_secs(ai.timeout_secs),
            )) as Arc<dyn Provider>
        });
        Self::new(provider, CompletionSettings::from(ai))
    }

    pub fn is_configured(&self) -> bool {
        self.provider.is_some()
    }

    pub fn settings(&self) -> &CompletionSettings {
        &self.settings
    }

    /// Complete using the configured retry budget and delay.
    pub async fn complete(&self, messages: Vec<Message>) -> String {
        self.complete_with(messages, self.settings.max_retries, self.settings.retry_delay)
            .await
    }

    /// Complete with an explicit retry budget and delay.
    pub async fn complete_with(
        &self,
        messages: Vec<Message>,
        max_retries: u32,
        delay: Duration,
    ) -> String {
        let Some(provider) = self.provider.as_ref() else {
            tracing::warn!("Completion requested but no API key is configured");
            return NOT_CONFIGURED_REPLY.to_string();
        };

        let request = ChatRequest {
            model: self.settings.model.clone(),
            messages,
            temperature: Some(self.settings.temperature),
            max_tokens: None,
        };
        let total = u64::from(max_retries) + 1;

        for retry in 0..=max_retries {
            let attempt = u64::from(retry) + 1;
            tracing::info!(
                provider = provider.name(),
                attempt,
                total,
                "AI attempt"
            );

            match provider.chat(request.clone()).await {
                Ok(response) => {
                    let reply = response
                        .content
                        .as_deref()
                        .map(str::trim)
                        .filter(|text| !text.is_empty());
                    if let Some(reply) = reply {
                        if retry > 0 {
                            tracing::info!(attempt, "Provider recovered after retries");
                        }
                        return reply.to_string();
                    }
                    tracing::warn!(
                        attempt,
                        finish_reason = ?response.finish_reason,
                        "AI returned an empty reply"
                    );
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "AI call failed");
                }
            }

            if retry < max_retries {
                tokio::time::sleep(delay).await;
            }
        }

        tracing::error!(attempts = total, "AI retries exhausted, sending fallback reply");
        FALLBACK_REPLY.to_string()
    }
}
