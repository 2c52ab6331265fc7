//! Resource manifest loading and index building

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use ee_core::rag::RESOURCE_PATH_KEY;
use ee_core::{Error, Result};

use crate::embedder::Embedder;
use crate::vector_store::{IndexedChunk, LocalVectorIndex};

pub const CHUNK_SIZE: usize = 700;
pub const CHUNK_OVERLAP: usize = 120;
const EMBED_BATCH_SIZE: usize = 32;
const UNKNOWN_RESOURCE_ID: &str = "unknown-resource";

/// One manifest entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(rename = "type", default)]
    pub resource_type: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl Resource {
    pub fn id(&self) -> &str {
        self.id.as_deref().unwrap_or(UNKNOWN_RESOURCE_ID)
    }

    fn is_pdf(&self, full_path: &Path) -> bool {
        let declared = self
            .resource_type
            .as_deref()
            .is_some_and(|t| t.eq_ignore_ascii_case("pdf"));
        let by_extension = full_path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
        declared || by_extension
    }
}

/// Summary of one index build
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexReport {
    pub resources: usize,
    pub chunks: usize,
    pub index_path: PathBuf,
}

/// Read the manifest, which must be a JSON array of resource objects.
pub fn load_manifest(manifest_path: &Path) -> Result<Vec<Resource>> {
    if !manifest_path.exists() {
        return Err(Error::Manifest(format!(
            "Manifest not found at {}. Create it to list your resources.",
            manifest_path.display()
        )));
    }

    let content = fs::read_to_string(manifest_path)?;
    let data: Value = serde_json::from_str(&content)
        .map_err(|e| Error::Manifest(format!("Manifest is not valid JSON: {}", e)))?;

    if !data.is_array() {
        return Err(Error::Manifest(
            "Manifest must be a JSON array of resource objects.".to_string(),
        ));
    }

    serde_json::from_value(data)
        .map_err(|e| Error::Manifest(format!("Invalid resource entry: {}", e)))
}

/// Resolve and read a text resource relative to `base_dir`.
fn load_resource(resource: &Resource, base_dir: &Path) -> Result<(String, String)> {
    let raw_path = resource
        .path
        .as_deref()
        .filter(|p| !p.is_empty())
        .ok_or_else(|| {
            Error::Manifest(format!(
                "Resource '{}' is missing required field: path",
                resource.id()
            ))
        })?;

    let full_path = base_dir.join(raw_path);
    if !full_path.exists() {
        return Err(Error::Manifest(format!("Resource path not found: {}", raw_path)));
    }
    if resource.is_pdf(&full_path) {
        return Err(Error::Manifest(format!(
            "Resource '{}' is a PDF; only plain-text resources can be indexed",
            resource.id()
        )));
    }

    let text = fs::read_to_string(&full_path)?;
    Ok((raw_path.to_string(), text))
}

/// Split `text` into overlapping windows of at most `size` characters.
///
/// A window ends at the last whitespace in its second half when there is one,
/// and the next window starts `overlap` characters before that end.
pub fn split_text(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let size = size.max(1);
    let overlap = overlap.min(size - 1);
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let mut end = (start + size).min(chars.len());
        if end < chars.len() {
            let floor = start + size / 2;
            if let Some(split) = (floor..end).rev().find(|&i| chars[i].is_whitespace()) {
                end = split;
            }
        }

        let chunk: String = chars[start..end].iter().collect();
        let chunk = chunk.trim();
        if !chunk.is_empty() {
            chunks.push(chunk.to_string());
        }

        if end >= chars.len() {
            break;
        }
        start = end.saturating_sub(overlap).max(start + 1);
    }

    chunks
}

fn chunk_id(resource_path: &str, content: &str) -> String {
    format!(
        "{:x}-{:x}",
        md5::compute(resource_path.as_bytes()),
        md5::compute(content.as_bytes())
    )
}

/// Build (or extend) the persisted index in `db_dir` from a manifest.
///
/// Resource paths are resolved against `base_dir`. With `reset`, any existing
/// index is replaced; otherwise new chunks are merged into it by id.
pub async fn build_index(
    manifest_path: &Path,
    db_dir: &Path,
    base_dir: &Path,
    embedder: &dyn Embedder,
    reset: bool,
) -> Result<IndexReport> {
    let resources = load_manifest(manifest_path)?;

    let mut pending: Vec<(String, Map<String, Value>)> = Vec::new();
    for resource in &resources {
        let (resource_path, text) = load_resource(resource, base_dir)?;
        let pieces = split_text(&text, CHUNK_SIZE, CHUNK_OVERLAP);
        debug!(resource = resource.id(), chunks = pieces.len(), "split resource");

        for piece in pieces {
            let mut metadata = Map::new();
            metadata.insert("resource_id".into(), resource.id().into());
            metadata.insert(RESOURCE_PATH_KEY.into(), resource_path.clone().into());
            metadata.insert(
                "resource_description".into(),
                resource.description.clone().unwrap_or_default().into(),
            );
            pending.push((piece, metadata));
        }
    }

    if pending.is_empty() {
        return Err(Error::Manifest(
            "No documents were loaded from the manifest.".to_string(),
        ));
    }

    let mut index: Option<LocalVectorIndex> = if !reset
        && LocalVectorIndex::index_path(db_dir).exists()
    {
        Some(LocalVectorIndex::open(db_dir, embedder.backend(), embedder.model())?)
    } else {
        None
    };

    let chunk_count = pending.len();
    for batch in pending.chunks(EMBED_BATCH_SIZE) {
        let texts: Vec<String> = batch.iter().map(|(text, _)| text.clone()).collect();
        let embeddings = embedder.embed(&texts).await?;

        for ((content, metadata), embedding) in batch.iter().zip(embeddings) {
            let target = index.get_or_insert_with(|| {
                LocalVectorIndex::new(embedder.backend(), embedder.model(), embedding.len())
            });
            let resource_path = metadata
                .get(RESOURCE_PATH_KEY)
                .and_then(Value::as_str)
                .unwrap_or_default();
            target.upsert(IndexedChunk {
                id: chunk_id(resource_path, content),
                content: content.clone(),
                metadata: metadata.clone(),
                embedding,
            })?;
        }
    }

    let index = index.ok_or_else(|| {
        Error::Retrieval("Embedder produced no vectors for the manifest".to_string())
    })?;
    index.save(db_dir)?;

    let report = IndexReport {
        resources: resources.len(),
        chunks: chunk_count,
        index_path: LocalVectorIndex::index_path(db_dir),
    };
    info!(
        resources = report.resources,
        chunks = report.chunks,
        path = %report.index_path.display(),
        "built vector index"
    );
    Ok(report)
}
