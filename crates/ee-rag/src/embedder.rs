//! Text embedding backends

use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, info, warn};

use ee_core::{AppConfig, Error, Result};

pub const FASTEMBED_BACKEND: &str = "fastembed";
pub const OLLAMA_BACKEND: &str = "ollama";
pub const HASHING_BACKEND: &str = "hashing";

/// Dimension of the feature-hashing embedder
pub const HASHING_DIMENSION: usize = 384;

const FASTEMBED_BATCH_SIZE: usize = 32;

/// Trait for embedding models
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Backend identifier recorded in the persisted index
    fn backend(&self) -> &str;

    /// Embedding model identifier recorded in the persisted index
    fn model(&self) -> &str;

    /// Embed a batch of texts, one vector per input in input order
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed(&[query.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| Error::Retrieval("Embedder returned no vector for the query".to_string()))
    }
}

/// Build the embedder named by `EMBEDDING_BACKEND`.
///
/// No model is loaded and no request is made here; unknown backends and
/// unsupported model identifiers are rejected up front.
pub fn embedder_from_config(config: &AppConfig) -> Result<Box<dyn Embedder>> {
    match config.embedding_backend.as_str() {
        FASTEMBED_BACKEND => Ok(Box::new(FastEmbedder::new(&config.embedding_model)?)),
        OLLAMA_BACKEND => Ok(Box::new(OllamaEmbedder::new(
            config.embedding_model.clone(),
            &config.ollama_base_url,
            config.request_timeout,
        )?)),
        HASHING_BACKEND => Ok(Box::new(HashingEmbedder::new(config.embedding_model.clone()))),
        other => Err(Error::Configuration(format!(
            "Unsupported EMBEDDING_BACKEND '{}'. Use one of: fastembed, ollama, hashing.",
            other
        ))),
    }
}

/// Map an `EMBEDDING_MODEL` identifier to a local ONNX model.
///
/// Accepts the bare name or a hub-style `owner/name` id, case-insensitively.
pub fn fastembed_model(id: &str) -> Result<EmbeddingModel> {
    let trimmed = id.trim();
    let name = trimmed.rsplit('/').next().unwrap_or(trimmed).to_lowercase();
    match name.as_str() {
        "all-minilm-l6-v2" => Ok(EmbeddingModel::AllMiniLML6V2),
        "all-minilm-l12-v2" => Ok(EmbeddingModel::AllMiniLML12V2),
        "bge-small-en-v1.5" => Ok(EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" => Ok(EmbeddingModel::BGEBaseENV15),
        "nomic-embed-text-v1.5" => Ok(EmbeddingModel::NomicEmbedTextV15),
        _ => Err(Error::Configuration(format!(
            "Unsupported EMBEDDING_MODEL '{}' for the fastembed backend. Use one of: \
             all-MiniLM-L6-v2, all-MiniLM-L12-v2, bge-small-en-v1.5, bge-base-en-v1.5, \
             nomic-embed-text-v1.5.",
            id
        ))),
    }
}

/// Sentence embeddings computed in-process with fastembed.
///
/// The model files are downloaded and loaded on first use, so building the
/// embedder is cheap and never touches the network.
pub struct FastEmbedder {
    model_id: String,
    model: EmbeddingModel,
    engine: OnceLock<TextEmbedding>,
}

impl FastEmbedder {
    pub fn new(model_id: &str) -> Result<Self> {
        Ok(Self {
            model: fastembed_model(model_id)?,
            model_id: model_id.trim().to_string(),
            engine: OnceLock::new(),
        })
    }

    fn engine(&self) -> Result<&TextEmbedding> {
        if let Some(engine) = self.engine.get() {
            return Ok(engine);
        }

        info!(model = %self.model_id, "loading embedding model");
        let options = InitOptions::new(self.model.clone()).with_show_download_progress(false);
        let engine = TextEmbedding::try_new(options).map_err(|e| {
            Error::Retrieval(format!(
                "Failed to initialize embedding model '{}': {}",
                self.model_id, e
            ))
        })?;
        Ok(self.engine.get_or_init(|| engine))
    }
}

#[async_trait]
impl Embedder for FastEmbedder {
    fn backend(&self) -> &str {
        FASTEMBED_BACKEND
    }

    fn model(&self) -> &str {
        &self.model_id
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(model = %self.model_id, inputs = texts.len(), "generating embeddings");
        self.engine()?
            .embed(texts.to_vec(), Some(FASTEMBED_BATCH_SIZE))
            .map_err(|e| Error::Retrieval(format!("Embedding generation failed: {}", e)))
    }
}

/// Deterministic offline embedder based on feature hashing.
///
/// Selected only with `EMBEDDING_BACKEND=hashing`; it needs no model files,
/// which makes it the backend of choice for tests and air-gapped smoke runs.
/// The model identifier is only a label here.
///
/// Words are lowercased and split on whitespace. Each word adds a
/// position-weighted contribution at three hashed indices and each adjacent
/// word pair adds a fixed weight at one index; the result is L2-normalised.
/// Hashes come from MD5 so vectors stay identical across builds and platforms.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    model: String,
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            dimension: HASHING_DIMENSION,
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn feature_hash(text: &str) -> u64 {
        let digest = md5::compute(text.as_bytes());
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest.0[..8]);
        u64::from_le_bytes(bytes)
    }

    /// Embed one text synchronously
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let normalized_text = text.to_lowercase();
        let words: Vec<&str> = normalized_text.split_whitespace().collect();
        let dim = self.dimension as u64;

        let mut embedding = vec![0.0f32; self.dimension];

        for (pos, word) in words.iter().enumerate() {
            let hash = Self::feature_hash(word);
            let position_weight = 1.0 / (pos as f32 + 1.0);

            embedding[(hash % dim) as usize] += position_weight;
            embedding[((hash >> 16) % dim) as usize] += position_weight * 0.7;
            embedding[((hash >> 32) % dim) as usize] += position_weight * 0.5;
        }

        for pair in words.windows(2) {
            let hash = Self::feature_hash(&format!("{} {}", pair[0], pair[1]));
            embedding[(hash % dim) as usize] += 0.8;
        }

        let magnitude: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for val in embedding.iter_mut() {
                *val /= magnitude;
            }
        }

        embedding
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn backend(&self) -> &str {
        HASHING_BACKEND
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.embed_text(text)).collect())
    }
}

/// Embeddings served by a local Ollama daemon
pub struct OllamaEmbedder {
    client: Client,
    model: String,
    base_url: String,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Deserialize)]
struct LegacyEmbeddingResponse {
    embedding: Vec<f32>,
}

impl OllamaEmbedder {
    pub fn new(model: impl Into<String>, base_url: &str, timeout: Duration) -> Result<Self> {
        url::Url::parse(base_url).map_err(|e| {
            Error::Configuration(format!(
                "OLLAMA_BASE_URL is not a valid URL '{}': {}",
                base_url, e
            ))
        })?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            model: model.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn unreachable(&self, url: &str, e: reqwest::Error) -> Error {
        Error::Retrieval(format!(
            "Failed to reach Ollama at {} ({}). Is `ollama serve` running?",
            url, e
        ))
    }

    /// Older daemons only expose the single-input endpoint.
    async fn embed_legacy(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/api/embeddings", self.base_url);
        let mut vectors = Vec::with_capacity(texts.len());

        for text in texts {
            let response = self
                .client
                .post(&url)
                .json(&json!({ "model": self.model, "prompt": text }))
                .send()
                .await
                .map_err(|e| self.unreachable(&url, e))?;

            if !response.status().is_success() {
                let status = response.status();
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                return Err(Error::Retrieval(format!(
                    "Ollama embeddings request failed with status {}: {}",
                    status, error_text
                )));
            }

            let body: LegacyEmbeddingResponse = response.json().await.map_err(|e| {
                Error::Retrieval(format!("Ollama /api/embeddings returned invalid JSON: {}", e))
            })?;
            vectors.push(body.embedding);
        }

        Ok(vectors)
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn backend(&self) -> &str {
        OLLAMA_BACKEND
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/api/embed", self.base_url);
        debug!(model = %self.model, inputs = texts.len(), "requesting Ollama embeddings");

        let response = self
            .client
            .post(&url)
            .json(&json!({ "model": self.model, "input": texts, "truncate": true }))
            .send()
            .await
            .map_err(|e| self.unreachable(&url, e))?;

        if !response.status().is_success() {
            warn!(status = %response.status(), "/api/embed unavailable, using /api/embeddings");
            return self.embed_legacy(texts).await;
        }

        let body: EmbedResponse = response.json().await.map_err(|e| {
            Error::Retrieval(format!("Ollama /api/embed returned invalid JSON: {}", e))
        })?;

        if body.embeddings.len() != texts.len() {
            return Err(Error::Retrieval(format!(
                "Ollama /api/embed returned {} embeddings for {} inputs",
                body.embeddings.len(),
                texts.len()
            )));
        }

        Ok(body.embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_hashing_is_deterministic_and_normalised() {
        let embedder = HashingEmbedder::new("all-MiniLM-L6-v2");
        let a = embedder.embed_text("Switch buffers with C-x b");
        let b = embedder.embed_text("switch BUFFERS with c-x b");

        assert_eq!(a.len(), HASHING_DIMENSION);
        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let embedder = HashingEmbedder::new("m");
        assert!(embedder.embed_text("   ").iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_default_backend_is_fastembed_for_configured_model() {
        let embedder = embedder_from_config(&AppConfig::default()).unwrap();
        assert_eq!(embedder.backend(), FASTEMBED_BACKEND);
        assert_eq!(embedder.model(), "all-MiniLM-L6-v2");
    }

    #[test]
    fn test_fastembed_model_mapping() {
        assert!(matches!(
            fastembed_model("all-MiniLM-L6-v2"),
            Ok(EmbeddingModel::AllMiniLML6V2)
        ));
        assert!(matches!(
            fastembed_model("sentence-transformers/all-MiniLM-L6-v2"),
            Ok(EmbeddingModel::AllMiniLML6V2)
        ));
        assert!(matches!(
            fastembed_model("BAAI/bge-small-en-v1.5"),
            Ok(EmbeddingModel::BGESmallENV15)
        ));
    }

    #[test]
    fn test_unsupported_fastembed_model_is_rejected() {
        let mut config = AppConfig::default();
        config.embedding_model = "text-embedding-3-small".to_string();
        let err = embedder_from_config(&config).err().unwrap();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("text-embedding-3-small"));
    }

    #[test]
    fn test_hashing_is_explicit_opt_in() {
        let mut config = AppConfig::default();
        config.embedding_backend = HASHING_BACKEND.to_string();
        let embedder = embedder_from_config(&config).unwrap();
        assert_eq!(embedder.backend(), HASHING_BACKEND);
    }

    #[test]
    fn test_unknown_backend_is_rejected() {
        let mut config = AppConfig::default();
        config.embedding_backend = "sentence-transformers".to_string();
        let err = embedder_from_config(&config).err().unwrap();
        assert!(err.is_configuration());
    }

    #[tokio::test]
    async fn test_ollama_batch_embed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .and(body_partial_json(json!({"model": "nomic-embed-text", "input": ["a", "b"]})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"embeddings": [[1.0, 0.0], [0.0, 1.0]]})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let embedder =
            OllamaEmbedder::new("nomic-embed-text", &server.uri(), Duration::from_secs(5)).unwrap();
        let vectors = embedder
            .embed(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[tokio::test]
    async fn test_ollama_falls_back_to_legacy_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"embedding": [0.5, 0.5]})))
            .expect(2)
            .mount(&server)
            .await;

        let embedder =
            OllamaEmbedder::new("nomic-embed-text", &server.uri(), Duration::from_secs(5)).unwrap();
        let vectors = embedder
            .embed(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        assert_eq!(vectors.len(), 2);
    }
}
