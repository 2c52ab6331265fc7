//! Core traits and types for Emacs Explained
//!
//! This crate defines the fundamental traits and types used across the workspace.
//! It provides capability-facing interfaces for chat providers and retrievers,
//! the error taxonomy, and the per-request configuration snapshot, so the
//! pipeline can be exercised with test doubles at every seam.

pub mod config;
pub mod error;
pub mod llm;
pub mod rag;
pub mod types;


pub use config::{AppConfig, ConfigSource, ConfigSummary, EnvConfigSource};
pub use error::{Error, Result};
pub use llm::{ChatProvider, ProviderKind};
pub use rag::{RetrievedChunk, Retriever};
pub use types::*;
