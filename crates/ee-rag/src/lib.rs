//! Retrieval-Augmented Generation support for Emacs Explained
//!
//! This crate owns the persisted local vector index: embedding text, building
//! the index from a resource manifest, and retrieving ranked chunks for the
//! answer pipeline.

pub mod embedder;
pub mod indexer;
pub mod retriever;
pub mod vector_store;


pub use embedder::{
    embedder_from_config, fastembed_model, Embedder, FastEmbedder, HashingEmbedder, OllamaEmbedder,
    FASTEMBED_BACKEND, HASHING_BACKEND, OLLAMA_BACKEND,
};
pub use indexer::{build_index, load_manifest, split_text, IndexReport, Resource};
pub use retriever::{extract_sources, format_context, VectorRetriever, NO_CONTEXT_SENTINEL};
pub use vector_store::{cosine_similarity, IndexedChunk, LocalVectorIndex, INDEX_FILE_NAME};

// Re-export core types for convenience
pub use ee_core::{Error, Result, RetrievedChunk, Retriever};
