//! Application configuration
//!
//! Settings are resolved from the process environment (and an optional `.env`
//! file) into an immutable [`AppConfig`] snapshot. The pipeline asks a
//! [`ConfigSource`] for a fresh snapshot on every call, so changes take effect
//! without a restart and tests can inject a fixed configuration instead of
//! mutating the environment.

use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::{Error, Result};

pub const DEFAULT_MODEL_PROVIDER: &str = "ollama";
pub const DEFAULT_CHAT_MODEL: &str = "deepseek-r1";
pub const DEFAULT_EMBEDDING_MODEL: &str = "all-MiniLM-L6-v2";
pub const DEFAULT_EMBEDDING_BACKEND: &str = "fastembed";
pub const DEFAULT_VECTOR_DB_DIR: &str = "emacs_db";
pub const DEFAULT_RETRIEVAL_K: usize = 4;
pub const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_LOCAL_SMALL_BASE_URL: &str = "http://127.0.0.1:8080/v1";
pub const DEFAULT_LOCAL_MODEL_FILE: &str = "data/models/tinyllama-1.1b-chat-v1.0.Q4_K_M.gguf";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_LOCAL_SMALL_TIMEOUT_SECS: u64 = 90;
pub const DEFAULT_LOCAL_LOG_PATH: &str = "logs/events.jsonl";

/// Immutable snapshot of every setting the pipeline needs for one request.
#[derive(Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Provider identifier (`ollama`, `openai` or `local_small`), lowercased.
    pub model_provider: String,
    pub chat_model: String,
    pub embedding_model: String,
    /// Embedding backend used to embed queries (`fastembed`, `ollama` or `hashing`).
    pub embedding_backend: String,
    /// Directory holding the persisted vector index.
    pub vector_db_dir: PathBuf,
    pub retrieval_k: usize,
    pub ollama_base_url: String,
    pub local_small_base_url: String,
    pub local_model_file: PathBuf,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    /// Timeout applied to the hosted and daemon backends.
    pub request_timeout: Duration,
    /// Timeout applied to the self-hosted local inference server.
    pub local_small_timeout: Duration,
    pub enable_local_logs: bool,
    pub local_log_path: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model_provider: DEFAULT_MODEL_PROVIDER.to_string(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            embedding_backend: DEFAULT_EMBEDDING_BACKEND.to_string(),
            vector_db_dir: PathBuf::from(DEFAULT_VECTOR_DB_DIR),
            retrieval_k: DEFAULT_RETRIEVAL_K,
            ollama_base_url: DEFAULT_OLLAMA_BASE_URL.to_string(),
            local_small_base_url: DEFAULT_LOCAL_SMALL_BASE_URL.to_string(),
            local_model_file: PathBuf::from(DEFAULT_LOCAL_MODEL_FILE),
            openai_api_key: None,
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            local_small_timeout: Duration::from_secs(DEFAULT_LOCAL_SMALL_TIMEOUT_SECS),
            enable_local_logs: false,
            local_log_path: PathBuf::from(DEFAULT_LOCAL_LOG_PATH),
        }
    }
}

impl AppConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Resolve configuration through an arbitrary key lookup.
    ///
    /// Every value is trimmed; unset or blank keys fall back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let text = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let retrieval_k = match get("RETRIEVAL_K") {
            Some(raw) => parse_positive("RETRIEVAL_K", &raw)? as usize,
            None => DEFAULT_RETRIEVAL_K,
        };
        let request_timeout = match get("LLM_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(parse_positive("LLM_TIMEOUT_SECS", &raw)?),
            None => Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        };
        let local_small_timeout = match get("LOCAL_SMALL_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(parse_positive("LOCAL_SMALL_TIMEOUT_SECS", &raw)?),
            None => Duration::from_secs(DEFAULT_LOCAL_SMALL_TIMEOUT_SECS),
        };
        let enable_local_logs = match get("ENABLE_LOCAL_LOGS") {
            Some(raw) => parse_flag("ENABLE_LOCAL_LOGS", &raw)?,
            None => false,
        };

        Ok(Self {
            model_provider: text("MODEL_PROVIDER", DEFAULT_MODEL_PROVIDER).to_lowercase(),
            chat_model: text("CHAT_MODEL", DEFAULT_CHAT_MODEL),
            embedding_model: text("EMBEDDING_MODEL", DEFAULT_EMBEDDING_MODEL),
            embedding_backend: text("EMBEDDING_BACKEND", DEFAULT_EMBEDDING_BACKEND).to_lowercase(),
            vector_db_dir: PathBuf::from(text("VECTOR_DB_DIR", DEFAULT_VECTOR_DB_DIR)),
            retrieval_k,
            ollama_base_url: text("OLLAMA_BASE_URL", DEFAULT_OLLAMA_BASE_URL),
            local_small_base_url: text("LOCAL_SMALL_BASE_URL", DEFAULT_LOCAL_SMALL_BASE_URL),
            local_model_file: PathBuf::from(text("LOCAL_MODEL_FILE", DEFAULT_LOCAL_MODEL_FILE)),
            openai_api_key: get("OPENAI_API_KEY"),
            openai_base_url: text("OPENAI_BASE_URL", DEFAULT_OPENAI_BASE_URL),
            request_timeout,
            local_small_timeout,
            enable_local_logs,
            local_log_path: PathBuf::from(text("LOCAL_LOG_PATH", DEFAULT_LOCAL_LOG_PATH)),
        })
    }

    /// Set the provider identifier
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.model_provider = provider.into().trim().to_lowercase();
        self
    }

    /// Set the chat model identifier
    pub fn with_chat_model(mut self, model: impl Into<String>) -> Self {
        self.chat_model = model.into();
        self
    }

    /// Set the hosted-backend credential
    pub fn with_openai_api_key(mut self, key: impl Into<String>) -> Self {
        self.openai_api_key = Some(key.into());
        self
    }

    /// Secret-free view of this configuration, suitable for display.
    pub fn summary(&self) -> ConfigSummary {
        ConfigSummary {
            model_provider: self.model_provider.clone(),
            chat_model: self.chat_model.clone(),
            embedding_model: self.embedding_model.clone(),
            embedding_backend: self.embedding_backend.clone(),
            vector_db_dir: self.vector_db_dir.display().to_string(),
            retrieval_k: self.retrieval_k,
            ollama_base_url: self.ollama_base_url.clone(),
            local_small_base_url: self.local_small_base_url.clone(),
            local_model_file: self.local_model_file.display().to_string(),
            has_openai_api_key: self.openai_api_key.is_some(),
            openai_base_url: self.openai_base_url.clone(),
            enable_local_logs: self.enable_local_logs,
        }
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("model_provider", &self.model_provider)
            .field("chat_model", &self.chat_model)
            .field("embedding_model", &self.embedding_model)
            .field("embedding_backend", &self.embedding_backend)
            .field("vector_db_dir", &self.vector_db_dir)
            .field("retrieval_k", &self.retrieval_k)
            .field("ollama_base_url", &self.ollama_base_url)
            .field("local_small_base_url", &self.local_small_base_url)
            .field("local_model_file", &self.local_model_file)
            .field("openai_api_key", &self.openai_api_key.as_ref().map(|_| "<redacted>"))
            .field("openai_base_url", &self.openai_base_url)
            .field("request_timeout", &self.request_timeout)
            .field("local_small_timeout", &self.local_small_timeout)
            .field("enable_local_logs", &self.enable_local_logs)
            .field("local_log_path", &self.local_log_path)
            .finish()
    }
}

/// Display form of [`AppConfig`]; the credential is reduced to a flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigSummary {
    pub model_provider: String,
    pub chat_model: String,
    pub embedding_model: String,
    pub embedding_backend: String,
    pub vector_db_dir: String,
    pub retrieval_k: usize,
    pub ollama_base_url: String,
    pub local_small_base_url: String,
    pub local_model_file: String,
    pub has_openai_api_key: bool,
    pub openai_base_url: String,
    pub enable_local_logs: bool,
}

/// Where the pipeline obtains its per-call configuration.
pub trait ConfigSource: Send + Sync {
    fn load(&self) -> Result<AppConfig>;
}

/// Reads the process environment on every call.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvConfigSource;

impl ConfigSource for EnvConfigSource {
    fn load(&self) -> Result<AppConfig> {
        AppConfig::from_env()
    }
}

impl ConfigSource for AppConfig {
    fn load(&self) -> Result<AppConfig> {
        Ok(self.clone())
    }
}

fn parse_positive(key: &str, raw: &str) -> Result<u64> {
    match raw.parse::<u64>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(Error::Configuration(format!(
            "{} must be a positive integer, got '{}'",
            key, raw
        ))),
    }
}

fn parse_flag(key: &str, raw: &str) -> Result<bool> {
    match raw.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::Configuration(format!(
            "{} must be a boolean flag, got '{}'",
            key, raw
        ))),
    }
}
