//! Request and response shapes shared by the OpenAI-compatible backends

use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use ee_core::{Error, Result};

/// Sampling temperature used for every generation request
pub(crate) const TEMPERATURE: f64 = 0.2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct ApiMessage {
    pub role: &'static str,
    pub content: String,
}

/// Build the message list: an optional leading system message, then the prompt.
pub(crate) fn chat_messages(prompt: &str, system: Option<&str>) -> Vec<ApiMessage> {
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = system.filter(|s| !s.is_empty()) {
        messages.push(ApiMessage {
            role: "system",
            content: system.to_string(),
        });
    }
    messages.push(ApiMessage {
        role: "user",
        content: prompt.to_string(),
    });
    messages
}

#[derive(Serialize)]
pub(crate) struct ChatCompletionRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<ApiMessage>,
    pub temperature: f64,
}

#[derive(Deserialize)]
pub(crate) struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatCompletionResponse {
    /// Trimmed text of the first choice
    pub(crate) fn first_choice_text(self, backend: &str) -> Result<String> {
        let choice = self.choices.into_iter().next().ok_or_else(|| {
            Error::Generation(format!("{} returned no completion choices", backend))
        })?;
        Ok(choice.message.content.unwrap_or_default().trim().to_string())
    }
}

/// Validate a configured base URL and strip trailing slashes.
pub(crate) fn normalize_base_url(setting: &str, raw: &str) -> Result<String> {
    url::Url::parse(raw)
        .map_err(|e| Error::Configuration(format!("{} is not a valid URL '{}': {}", setting, raw, e)))?;
    Ok(raw.trim_end_matches('/').to_string())
}

pub(crate) fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| Error::Configuration(format!("Failed to build HTTP client: {}", e)))
}

/// Turn a non-success status into a generation error carrying the body.
pub(crate) async fn ensure_success(response: Response, backend: &str) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(Error::Generation(format!(
        "{} request failed with status {}: {}",
        backend, status, error_text
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_message_leads() {
        let messages = chat_messages("question", Some("be brief"));
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[1].role, "user");
        assert_eq!(messages[1].content, "question");
    }

    #[test]
    fn test_empty_system_is_dropped() {
        let messages = chat_messages("question", Some(""));
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, "user");
    }

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(
            normalize_base_url("OPENAI_BASE_URL", "https://api.openai.com/v1/").unwrap(),
            "https://api.openai.com/v1"
        );
        assert!(normalize_base_url("OPENAI_BASE_URL", "not a url").is_err());
    }

    #[test]
    fn test_first_choice_is_trimmed() {
        let response: ChatCompletionResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"content":"  hi there \n"}},{"message":{"content":"second"}}]}"#,
        )
        .unwrap();
        assert_eq!(response.first_choice_text("test").unwrap(), "hi there");
    }

    #[test]
    fn test_no_choices_is_a_generation_error() {
        let response: ChatCompletionResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        let err = response.first_choice_text("test").unwrap_err();
        assert!(matches!(err, Error::Generation(_)));
    }
}
