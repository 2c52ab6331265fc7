//! Answer pipeline for Emacs Explained
//!
//! Ties provider selection, retrieval, prompt assembly and telemetry together
//! behind the two user-facing operations, [`Assistant::ask`] and
//! [`Assistant::explain_region`].

pub mod pipeline;
pub mod prompts;
pub mod telemetry;


pub use pipeline::{Assistant, RetrieverFactory, VectorRetrieverFactory};
pub use prompts::{render_ask_prompt, render_explain_prompt, retrieval_query, MAX_QUERY_CODE_CHARS};
pub use telemetry::{JsonlTelemetrySink, TelemetrySink};

// Re-export core types for convenience
pub use ee_core::{AnswerResult, AppConfig, Error, Result};
