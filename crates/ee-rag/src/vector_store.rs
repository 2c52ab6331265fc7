//! File-backed vector index with brute-force cosine search

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use ee_core::{Error, Result, RetrievedChunk};

/// File name of the persisted index inside the vector directory
pub const INDEX_FILE_NAME: &str = "index.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedChunk {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub embedding: Vec<f32>,
}

/// All indexed chunks plus the embedding backend and model they were produced with
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalVectorIndex {
    embedding_backend: String,
    embedding_model: String,
    dimension: usize,
    chunks: Vec<IndexedChunk>,
}

impl LocalVectorIndex {
    /// Create an empty index
    pub fn new(
        embedding_backend: impl Into<String>,
        embedding_model: impl Into<String>,
        dimension: usize,
    ) -> Self {
        Self {
            embedding_backend: embedding_backend.into(),
            embedding_model: embedding_model.into(),
            dimension,
            chunks: Vec::new(),
        }
    }

    pub fn index_path(dir: &Path) -> PathBuf {
        dir.join(INDEX_FILE_NAME)
    }

    /// Load the index stored in `dir`.
    ///
    /// The index must have been built with the same embedding backend and
    /// model, since vectors from different embedders are not comparable.
    pub fn open(dir: &Path, embedding_backend: &str, embedding_model: &str) -> Result<Self> {
        let path = Self::index_path(dir);
        if !path.exists() {
            return Err(Error::Retrieval(format!(
                "Vector index not found at {}. Build it with `emacs-explained index` first.",
                path.display()
            )));
        }

        let content = fs::read_to_string(&path)?;
        let index: LocalVectorIndex = serde_json::from_str(&content).map_err(|e| {
            Error::Retrieval(format!("Vector index at {} is malformed: {}", path.display(), e))
        })?;

        if index.embedding_backend != embedding_backend {
            return Err(Error::Retrieval(format!(
                "Vector index at {} was built with embedding backend '{}' but '{}' is configured. \
                 Rebuild the index or change EMBEDDING_BACKEND.",
                path.display(),
                index.embedding_backend,
                embedding_backend
            )));
        }

        if index.embedding_model != embedding_model {
            return Err(Error::Retrieval(format!(
                "Vector index at {} was built with embedding model '{}' but '{}' is configured. \
                 Rebuild the index or change EMBEDDING_MODEL.",
                path.display(),
                index.embedding_model,
                embedding_model
            )));
        }

        if let Some(bad) = index.chunks.iter().find(|c| c.embedding.len() != index.dimension) {
            return Err(Error::Retrieval(format!(
                "Chunk '{}' has {} dimensions, expected {}",
                bad.id,
                bad.embedding.len(),
                index.dimension
            )));
        }

        debug!(path = %path.display(), chunks = index.chunks.len(), "opened vector index");
        Ok(index)
    }

    /// Write the index to `dir`, creating the directory if needed.
    pub fn save(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Serialization(e.to_string()))?;
        fs::write(Self::index_path(dir), content)?;
        Ok(())
    }

    pub fn embedding_backend(&self) -> &str {
        &self.embedding_backend
    }

    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Insert a chunk, replacing any existing chunk with the same id.
    pub fn upsert(&mut self, chunk: IndexedChunk) -> Result<()> {
        if chunk.embedding.len() != self.dimension {
            return Err(Error::Retrieval(format!(
                "Embedding for chunk '{}' has {} dimensions, expected {}",
                chunk.id,
                chunk.embedding.len(),
                self.dimension
            )));
        }

        match self.chunks.iter_mut().find(|existing| existing.id == chunk.id) {
            Some(existing) => *existing = chunk,
            None => self.chunks.push(chunk),
        }
        Ok(())
    }

    /// Top `k` chunks by cosine similarity, best first; ties keep index order.
    pub fn search(&self, query_embedding: &[f32], k: usize) -> Result<Vec<RetrievedChunk>> {
        if query_embedding.len() != self.dimension {
            return Err(Error::Retrieval(format!(
                "Query embedding has {} dimensions, index expects {}",
                query_embedding.len(),
                self.dimension
            )));
        }

        let mut scored: Vec<(f32, &IndexedChunk)> = self
            .chunks
            .iter()
            .map(|chunk| {
                let score = cosine_similarity(query_embedding, &chunk.embedding);
                // NaN ranks last so the comparator stays a total order.
                let score = if score.is_nan() { f32::NEG_INFINITY } else { score };
                (score, chunk)
            })
            .collect();

        // Stable sort, so equal scores stay in insertion order.
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(score, chunk)| RetrievedChunk {
                content: chunk.content.clone(),
                metadata: chunk.metadata.clone(),
                score: Some(score),
            })
            .collect())
    }
}

/// Cosine similarity; zero when either vector has no magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        0.0
    } else {
        dot_product / (magnitude_a * magnitude_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: &str, embedding: Vec<f32>) -> IndexedChunk {
        IndexedChunk {
            id: id.to_string(),
            content: format!("content of {}", id),
            metadata: Map::new(),
            embedding,
        }
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_search_ranks_best_first_and_keeps_tie_order() {
        let mut index = LocalVectorIndex::new("hashing", "m", 2);
        index.upsert(chunk("far", vec![0.0, 1.0])).unwrap();
        index.upsert(chunk("tie-a", vec![1.0, 1.0])).unwrap();
        index.upsert(chunk("near", vec![1.0, 0.0])).unwrap();
        index.upsert(chunk("tie-b", vec![2.0, 2.0])).unwrap();

        let results = index.search(&[1.0, 0.0], 3).unwrap();
        let contents: Vec<&str> = results.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, vec!["content of near", "content of tie-a", "content of tie-b"]);
    }

    #[test]
    fn test_nan_scores_rank_last() {
        let mut index = LocalVectorIndex::new("hashing", "m", 2);
        index.upsert(chunk("broken", vec![f32::NAN, 0.0])).unwrap();
        index.upsert(chunk("low", vec![0.0, 1.0])).unwrap();
        index.upsert(chunk("also-broken", vec![0.0, f32::NAN])).unwrap();
        index.upsert(chunk("high", vec![1.0, 0.0])).unwrap();

        let results = index.search(&[1.0, 0.0], 4).unwrap();
        let contents: Vec<&str> = results.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(
            contents,
            vec![
                "content of high",
                "content of low",
                "content of broken",
                "content of also-broken"
            ]
        );
        assert_eq!(results[2].score, Some(f32::NEG_INFINITY));
    }

    #[test]
    fn test_upsert_replaces_by_id() {
        let mut index = LocalVectorIndex::new("hashing", "m", 2);
        index.upsert(chunk("a", vec![1.0, 0.0])).unwrap();
        index.upsert(chunk("a", vec![0.0, 1.0])).unwrap();
        assert_eq!(index.len(), 1);
        assert!(index.upsert(chunk("b", vec![1.0])).is_err());
    }

    #[test]
    fn test_save_and_open_checks_model() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = LocalVectorIndex::new("fastembed", "all-MiniLM-L6-v2", 2);
        index.upsert(chunk("a", vec![1.0, 0.0])).unwrap();
        index.save(dir.path()).unwrap();

        let reopened = LocalVectorIndex::open(dir.path(), "fastembed", "all-MiniLM-L6-v2").unwrap();
        assert_eq!(reopened.len(), 1);
        assert_eq!(reopened.embedding_backend(), "fastembed");

        let err = LocalVectorIndex::open(dir.path(), "fastembed", "nomic-embed-text").unwrap_err();
        assert!(err.to_string().contains("all-MiniLM-L6-v2"));

        let err = LocalVectorIndex::open(dir.path(), "hashing", "all-MiniLM-L6-v2").unwrap_err();
        assert!(matches!(err, Error::Retrieval(_)));
        assert!(err.to_string().contains("EMBEDDING_BACKEND"), "{err}");
    }

    #[test]
    fn test_open_missing_and_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let missing = LocalVectorIndex::open(dir.path(), "hashing", "m").unwrap_err();
        assert!(matches!(missing, Error::Retrieval(_)));

        fs::write(dir.path().join(INDEX_FILE_NAME), "{not json").unwrap();
        let malformed = LocalVectorIndex::open(dir.path(), "hashing", "m").unwrap_err();
        assert!(matches!(malformed, Error::Retrieval(_)));
    }
}
