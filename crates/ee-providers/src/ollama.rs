//! Local Ollama daemon backend

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use ee_core::{AppConfig, ChatProvider, Error, ProviderKind, Result};

use crate::wire::{self, ApiMessage, TEMPERATURE};

/// Client for an Ollama-style daemon using the single-prompt generate API
pub struct OllamaProvider {
    client: Client,
    model: String,
    base_url: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ApiMessage>,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f64,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: String,
}

/// Fold an optional system text into the single prompt string the daemon accepts.
pub(crate) fn compose_prompt(prompt: &str, system: Option<&str>) -> String {
    match system.filter(|s| !s.is_empty()) {
        Some(system) => format!("System:\n{}\n\nUser:\n{}", system, prompt),
        None => prompt.to_string(),
    }
}

/// Ollama answers `{"error":"model \"x\" not found, try pulling it first"}`
/// when the endpoint exists but the model does not.
fn reports_missing_model(body: &str) -> bool {
    let body = body.to_lowercase();
    body.contains("model") && body.contains("not found")
}

impl OllamaProvider {
    pub fn new(model: impl Into<String>, base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: wire::build_client(timeout)?,
            model: model.into(),
            base_url: wire::normalize_base_url("OLLAMA_BASE_URL", base_url)?,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Self::new(
            config.chat_model.clone(),
            &config.ollama_base_url,
            config.request_timeout,
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn transport_error(&self, url: &str, e: reqwest::Error) -> Error {
        Error::Generation(format!(
            "Ollama request to {} failed: {}. Is the daemon running at {}?",
            url, e, self.base_url
        ))
    }

    async fn chat_fallback(&self, full_prompt: String) -> Result<String> {
        let url = format!("{}/api/chat", self.base_url);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ApiMessage {
                role: "user",
                content: full_prompt,
            }],
            stream: false,
            options: GenerateOptions {
                temperature: TEMPERATURE,
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.transport_error(&url, e))?;
        let response = wire::ensure_success(response, "Ollama chat").await?;

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Generation(format!("Failed to parse Ollama chat response: {}", e)))?;
        Ok(body.message.content)
    }
}

#[async_trait]
impl ChatProvider for OllamaProvider {
    fn name(&self) -> &str {
        ProviderKind::Ollama.as_str()
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str, system: Option<&str>) -> Result<String> {
        let full_prompt = compose_prompt(prompt, system);
        let url = format!("{}/api/generate", self.base_url);
        let request = GenerateRequest {
            model: &self.model,
            prompt: &full_prompt,
            stream: false,
            options: GenerateOptions {
                temperature: TEMPERATURE,
            },
        };

        debug!(model = %self.model, url = %url, "sending Ollama generate request");

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.transport_error(&url, e))?;

        // Daemons without the generate endpoint still serve /api/chat, but a
        // 404 for an unknown model would fail there too.
        if response.status() == StatusCode::NOT_FOUND {
            let text = response.text().await.unwrap_or_default();
            if reports_missing_model(&text) {
                return Err(Error::Generation(format!(
                    "Ollama generate request failed with status 404: {}. \
                     Pull it with `ollama pull {}`.",
                    text.trim(),
                    self.model
                )));
            }
            warn!(url = %url, "generate endpoint not found, retrying through /api/chat");
            return self.chat_fallback(full_prompt).await;
        }

        let response = wire::ensure_success(response, "Ollama generate").await?;
        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| Error::Generation(format!("Failed to parse Ollama response: {}", e)))?;
        Ok(body.response)
    }
}
