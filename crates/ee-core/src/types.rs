//! Common types used across the Emacs Explained system

use serde::{Deserialize, Serialize};

/// Event kind recorded for every finished pipeline call
pub const COMPLETION_EVENT: &str = "completion";

/// The answer handed back to the caller of `ask` / `explain_region`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerResult {
    pub answer: String,
    /// Unique resource identifiers in first-seen rank order
    pub sources: Vec<String>,
    pub provider: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Which user-facing operation produced an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interaction {
    Ask,
    ExplainRegion,
}

impl Interaction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Interaction::Ask => "ask",
            Interaction::ExplainRegion => "explain_region",
        }
    }
}

/// One append-only telemetry record, minus the timestamp the sink adds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub event: String,
    pub request_id: Option<String>,
    pub interaction: Interaction,
    pub provider: String,
    pub model: String,
    pub skill_level: String,
    pub retrieval_chunk_count: usize,
}
