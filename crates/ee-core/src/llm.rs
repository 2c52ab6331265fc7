//! Chat provider trait and types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Supported chat backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderKind {
    /// Local Ollama-style daemon
    #[serde(rename = "ollama")]
    Ollama,
    /// Hosted OpenAI-compatible API
    #[serde(rename = "openai")]
    OpenAi,
    /// Self-hosted OpenAI-compatible inference server (llama.cpp)
    #[serde(rename = "local_small")]
    LocalSmall,
}

impl ProviderKind {
    /// Get the configuration identifier for this backend
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Ollama => "ollama",
            ProviderKind::OpenAi => "openai",
            ProviderKind::LocalSmall => "local_small",
        }
    }

    /// Get all supported backends
    pub fn all() -> Vec<ProviderKind> {
        vec![
            ProviderKind::LocalSmall,
            ProviderKind::Ollama,
            ProviderKind::OpenAi,
        ]
    }

    /// Comma-separated list of valid identifiers, for error messages
    pub fn valid_identifiers() -> String {
        Self::all()
            .iter()
            .map(|kind| kind.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "ollama" => Ok(ProviderKind::Ollama),
            "openai" => Ok(ProviderKind::OpenAi),
            "local_small" => Ok(ProviderKind::LocalSmall),
            other => Err(Error::Configuration(format!(
                "Unsupported MODEL_PROVIDER '{}'. Use one of: {}.",
                other,
                Self::valid_identifiers()
            ))),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trait for chat backends (e.g. OpenAI, Ollama, a local llama.cpp server)
///
/// Implementations are immutable after construction: `generate` borrows the
/// provider and never changes its model or endpoint. Every failure while
/// talking to the backend is reported as [`Error::Generation`].
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Backend identifier, constant per implementation
    fn name(&self) -> &str;

    /// Configured model identifier
    fn model(&self) -> &str;

    /// Generate a completion for `prompt`, optionally steered by `system` text
    async fn generate(&self, prompt: &str, system: Option<&str>) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_round_trips_identifier() {
        for kind in ProviderKind::all() {
            assert_eq!(kind.as_str().parse::<ProviderKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_provider_kind_is_case_insensitive() {
        assert_eq!(" OLLAMA ".parse::<ProviderKind>().unwrap(), ProviderKind::Ollama);
        assert_eq!("OpenAI".parse::<ProviderKind>().unwrap(), ProviderKind::OpenAi);
    }

    #[test]
    fn test_unknown_provider_names_valid_set() {
        let err = "gemini".parse::<ProviderKind>().unwrap_err();
        let message = err.to_string();
        assert!(err.is_configuration());
        assert!(message.contains("local_small, ollama, openai"), "{message}");
    }

    #[test]
    fn test_provider_kind_serializes_as_identifier() {
        let json = serde_json::to_string(&ProviderKind::LocalSmall).unwrap();
        assert_eq!(json, "\"local_small\"");
    }
}
