//! Hosted OpenAI-compatible chat completions backend

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use ee_core::{AppConfig, ChatProvider, Error, ProviderKind, Result};

use crate::wire::{self, ChatCompletionRequest, ChatCompletionResponse, TEMPERATURE};

/// Client for a hosted chat completions API that requires a bearer credential
pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiProvider {
    /// Create a provider; fails before any I/O when the credential is missing.
    pub fn new(
        model: impl Into<String>,
        api_key: Option<&str>,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let api_key = api_key
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                Error::Configuration(
                    "OPENAI_API_KEY is required when MODEL_PROVIDER=openai".to_string(),
                )
            })?;

        Ok(Self {
            client: wire::build_client(timeout)?,
            api_key: api_key.to_string(),
            model: model.into(),
            base_url: wire::normalize_base_url("OPENAI_BASE_URL", base_url)?,
        })
    }

    /// Create a provider from the resolved configuration
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Self::new(
            config.chat_model.clone(),
            config.openai_api_key.as_deref(),
            &config.openai_base_url,
            config.request_timeout,
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl ChatProvider for OpenAiProvider {
    fn name(&self) -> &str {
        ProviderKind::OpenAi.as_str()
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str, system: Option<&str>) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: wire::chat_messages(prompt, system),
            temperature: TEMPERATURE,
        };

        debug!(model = %self.model, url = %url, "sending OpenAI chat completion request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Generation(format!("OpenAI request to {} failed: {}", url, e)))?;

        let response = wire::ensure_success(response, "OpenAI API").await?;

        let body: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| Error::Generation(format!("Failed to parse OpenAI response: {}", e)))?;

        body.first_choice_text("OpenAI API")
    }
}
