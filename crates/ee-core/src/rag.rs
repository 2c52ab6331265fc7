//! Retrieval trait and types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::Result;

/// Metadata key written by the index builder
pub const RESOURCE_PATH_KEY: &str = "resource_path";
/// Metadata key populated by generic document loaders
pub const SOURCE_KEY: &str = "source";

/// A ranked chunk of indexed text and the metadata it was stored with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub content: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    /// Similarity to the query, when produced by a vector search
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

impl RetrievedChunk {
    /// Create a chunk without metadata
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: Map::new(),
            score: None,
        }
    }

    /// Attach a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Human-readable identifier of the originating resource.
    ///
    /// `resource_path` wins over `source`; blank or non-string values are skipped.
    pub fn source_id(&self) -> Option<&str> {
        [RESOURCE_PATH_KEY, SOURCE_KEY]
            .iter()
            .filter_map(|key| self.metadata.get(*key).and_then(Value::as_str))
            .find(|value| !value.is_empty())
    }
}

/// Trait for retrievers
///
/// A retriever turns a free-text query into at most `k` chunks, ranked
/// best-first. It performs no deduplication.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>>;
}
