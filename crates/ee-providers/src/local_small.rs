//! Self-hosted llama.cpp server backend (OpenAI-compatible)

use async_trait::async_trait;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use ee_core::{AppConfig, ChatProvider, Error, ProviderKind, Result};

use crate::wire::{self, ChatCompletionRequest, ChatCompletionResponse, TEMPERATURE};

const DEFAULT_SERVER_PORT: u16 = 8080;

/// Client for a `llama-server` process serving a local model file
pub struct LocalSmallProvider {
    client: Client,
    model: String,
    base_url: String,
    model_file: PathBuf,
    port: u16,
}

impl LocalSmallProvider {
    pub fn new(
        model: impl Into<String>,
        base_url: &str,
        model_file: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Result<Self> {
        let port = url::Url::parse(base_url)
            .ok()
            .and_then(|url| url.port_or_known_default())
            .unwrap_or(DEFAULT_SERVER_PORT);

        Ok(Self {
            client: wire::build_client(timeout)?,
            model: model.into(),
            base_url: wire::normalize_base_url("LOCAL_SMALL_BASE_URL", base_url)?,
            model_file: model_file.into(),
            port,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Self::new(
            config.chat_model.clone(),
            &config.local_small_base_url,
            config.local_model_file.clone(),
            config.local_small_timeout,
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model_file(&self) -> &Path {
        &self.model_file
    }

    fn server_unreachable(&self, e: reqwest::Error) -> Error {
        Error::Generation(format!(
            "Could not reach the local inference server at {} ({}). Start it with \
             `llama-server -m {} --port {}` and try again.",
            self.base_url,
            e,
            self.model_file.display(),
            self.port
        ))
    }
}

#[async_trait]
impl ChatProvider for LocalSmallProvider {
    fn name(&self) -> &str {
        ProviderKind::LocalSmall.as_str()
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

        debug!(model = %self.model, url = %url, "sending local server chat completion request");

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.server_unreachable(e))?;

        let response = wire::ensure_success(response, "Local inference server").await?;

        let body: ChatCompletionResponse = response.json().await.map_err(|e| {
            Error::Generation(format!("Failed to parse local server response: {}", e))
        })?;

        body.first_choice_text("Local inference server")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_port_taken_from_base_url() {
        let provider = LocalSmallProvider::new(
            "tinyllama",
            "http://127.0.0.1:9090/v1/",
            "models/tiny.gguf",
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(provider.port, 9090);
        assert_eq!(provider.base_url(), "http://127.0.0.1:9090/v1");
        assert_eq!(provider.model_file(), Path::new("models/tiny.gguf"));
    }

    #[tokio::test]
    async fn test_generate_against_compatible_server() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(json!({
                "model": "tinyllama",
                "messages": [{"role": "user", "content": "explain setq"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": " setq assigns a variable. "}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = LocalSmallProvider::new(
            "tinyllama",
            &format!("{}/v1", server.uri()),
            "models/tiny.gguf",
            Duration::from_secs(5),
        )
        .unwrap();

        let answer = provider.generate("explain setq", None).await.unwrap();
        assert_eq!(answer, "setq assigns a variable.");
    }

    #[tokio::test]
    async fn test_unreachable_server_names_start_command() {
        let provider = LocalSmallProvider::new(
            "tinyllama",
            "http://127.0.0.1:1/v1",
            "models/tiny.gguf",
            Duration::from_secs(5),
        )
        .unwrap();

        let err = provider.generate("hello", None).await.unwrap_err();
        let message = err.to_string();
        assert!(matches!(err, Error::Generation(_)));
        assert!(
            message.contains("llama-server -m models/tiny.gguf --port 1"),
            "{message}"
        );
    }
}
