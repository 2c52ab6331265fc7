//! Chat provider backends for Emacs Explained
//!
//! This crate provides the three implementations of the `ChatProvider` trait
//! and the configuration-driven selection between them.

mod local_small;
mod ollama;
mod openai;
mod selection;
mod wire;


pub use local_small::LocalSmallProvider;
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;
pub use selection::{
    check_local_small_prereqs, prepare_provider, select_provider, BackendFactory, Provider,
    ProviderFactory, MODEL_SYNC_REMEDIATION,
};

// Re-export core types for convenience
pub use ee_core::{AppConfig, ChatProvider, Error, ProviderKind, Result};
