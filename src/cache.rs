//! On-disk cache of catalog embedding vectors.
//!
//! One JSON artifact per catalog. Writes go to a temporary file in the same
//! directory which is then renamed over the artifact, so concurrent writers
//! never leave a torn file behind.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Cached vectors for one catalog, keyed by the catalog's identity.
#[derive(Debug, Clone)]
pub struct CatalogEmbeddingCache {
    key: String,
    path: PathBuf,
    model: String,
}

#[derive(Serialize, Deserialize)]
struct CacheArtifact {
    key: String,
    model: String,
    vectors: Vec<Vec<f32>>,
}

impl CatalogEmbeddingCache {
    /// Cache stored at `path` for catalog `key` embedded with `model`.
    pub fn new(key: impl Into<String>, path: impl Into<PathBuf>, model: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            path: path.into(),
            model: model.into(),
        }
    }

    /// Cache stored beside the catalog file as `<stem>.embeddings.json`.
    pub fn beside_catalog(catalog: &Path, model: impl Into<String>) -> Self {
        let stem = catalog
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "catalog".to_string());
        let path = catalog.with_file_name(format!("{stem}.embeddings.json"));
        Self::new(catalog.display().to_string(), path, model)
    }

    /// Catalog identity.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Artifact location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns cached vectors when the artifact exists, was written for the
    /// same catalog and model, and holds exactly `expected_rows` vectors. Any other
    /// state is a miss.
    pub fn get(&self, expected_rows: usize) -> Option<Vec<Vec<f32>>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "failed to read embedding cache");
                return None;
            }
        };
        let artifact: CacheArtifact = match serde_json::from_slice(&bytes) {
            Ok(artifact) => artifact,
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "ignoring unreadable embedding cache");
                return None;
            }
        };
        if artifact.key != self.key {
            warn!(
                cached = %artifact.key,
                current = %self.key,
                "ignoring embedding cache written for another catalog"
            );
            return None;
        }
        if artifact.model != self.model {
            warn!(
                cached = %artifact.model,
                current = %self.model,
                "ignoring embedding cache written for another model"
            );
            return None;
        }
        if artifact.vectors.len() != expected_rows {
            warn!(
                cached = artifact.vectors.len(),
                expected = expected_rows,
                "ignoring embedding cache with stale row count"
            );
            return None;
        }
        debug!(path = %self.path.display(), rows = expected_rows, "embedding cache hit");
        Some(artifact.vectors)
    }

    /// Atomically replaces the artifact with `vectors`.
    pub fn put(&self, vectors: &[Vec<f32>]) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create cache directory {}", dir.display()))?;
        let artifact = CacheArtifact {
            key: self.key.clone(),
            model: self.model.clone(),
            vectors: vectors.to_vec(),
        };
        let mut tmp = NamedTempFile::new_in(&dir)
            .with_context(|| format!("failed to create temp file in {}", dir.display()))?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            serde_json::to_writer(&mut writer, &artifact)
                .context("failed to serialize embedding cache")?;
            writer.flush().context("failed to flush embedding cache")?;
        }
        tmp.persist(&self.path)
            .with_context(|| format!("failed to replace {}", self.path.display()))?;
        Ok(())
    }
}
