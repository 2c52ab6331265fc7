//! Error types for Emacs Explained

use thiserror::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for the Emacs Explained system
#[derive(Error, Debug)]
pub enum Error {
    /// Unknown provider identifier, missing credential or an unparsable setting.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Missing local asset: {path}. {remediation}")]
    MissingAsset { path: String, remediation: String },

    /// Any transport, authentication or response-parsing failure while
    /// calling a chat provider.
    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Retrieval error: {0}")]
    Retrieval(String),

    #[error("Telemetry error: {0}")]
    Telemetry(String),

    #[error("Manifest error: {0}")]
    Manifest(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for the configuration kind, used by callers that map errors to
    /// exit codes or HTTP statuses.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::Configuration(_))
    }
}
