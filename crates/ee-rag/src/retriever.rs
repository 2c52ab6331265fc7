//! Query-time retrieval over the local vector index

use async_trait::async_trait;
use tracing::debug;

use ee_core::{AppConfig, Result, RetrievedChunk, Retriever};

use crate::embedder::{embedder_from_config, Embedder};
use crate::vector_store::LocalVectorIndex;

/// Context text used when retrieval produced no chunks
pub const NO_CONTEXT_SENTINEL: &str = "No relevant context found in indexed resources.";

/// Retriever pairing an embedder with a read-only loaded index
pub struct VectorRetriever {
    embedder: Box<dyn Embedder>,
    index: LocalVectorIndex,
}

impl VectorRetriever {
    pub fn new(embedder: Box<dyn Embedder>, index: LocalVectorIndex) -> Self {
        Self { embedder, index }
    }

    /// Open the index in `config.vector_db_dir` with the configured embedder.
    pub fn open(config: &AppConfig) -> Result<Self> {
        let embedder = embedder_from_config(config)?;
        let index =
            LocalVectorIndex::open(&config.vector_db_dir, embedder.backend(), embedder.model())?;
        Ok(Self::new(embedder, index))
    }

    pub fn index(&self) -> &LocalVectorIndex {
        &self.index
    }
}

#[async_trait]
impl Retriever for VectorRetriever {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        let query_embedding = self.embedder.embed_query(query).await?;
        let chunks = self.index.search(&query_embedding, k)?;
        debug!(k, returned = chunks.len(), "retrieved context chunks");
        Ok(chunks)
    }
}

/// Render chunks as numbered, source-labelled sections in rank order.
pub fn format_context(chunks: &[RetrievedChunk]) -> String {
    if chunks.is_empty() {
        return NO_CONTEXT_SENTINEL.to_string();
    }

    chunks
        .iter()
        .enumerate()
        .map(|(idx, chunk)| {
            format!(
                "[Source {}: {}]\n{}",
                idx + 1,
                chunk.source_id().unwrap_or("unknown"),
                chunk.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Unique resource identifiers in first-seen order.
pub fn extract_sources(chunks: &[RetrievedChunk]) -> Vec<String> {
    let mut sources: Vec<String> = Vec::new();
    for source in chunks.iter().filter_map(RetrievedChunk::source_id) {
        if !sources.iter().any(|seen| seen == source) {
            sources.push(source.to_string());
        }
    }
    sources
}
