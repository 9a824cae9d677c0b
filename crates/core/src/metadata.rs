//! Document metadata and authority scores.
//!
//! `document_metadata.json` maps doc ID → `{title, authors[], abstract}`;
//! `embeddings/doc_scores.json` maps doc ID → authority score in [0, 1].
//! Both are optional at startup (a missing file degrades to defaults),
//! but the metadata store is also how incremental inserts detect document
//! ID collisions, so it is kept write-through.

use crate::config::DEFAULT_AUTHORITY;
use crate::lexicon::atomic_write;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;

/// Displayable metadata for one document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: String,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(rename = "abstract", default)]
    pub abstract_text: String,
}

/// In-memory view of document metadata plus authority scores.
#[derive(Debug, Default)]
pub struct MetadataStore {
    docs: HashMap<String, DocumentMetadata>,
    scores: HashMap<String, f32>,
}

impl MetadataStore {
    /// Load both files; either may be absent.
    pub fn load(metadata_path: &Path, scores_path: &Path) -> io::Result<Self> {
        let docs = if metadata_path.exists() {
            let raw = fs::read_to_string(metadata_path)?;
            serde_json::from_str(&raw).map_err(|e| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("invalid metadata {}: {}", metadata_path.display(), e),
                )
            })?
        } else {
            HashMap::new()
        };

        let scores = if scores_path.exists() {
            let raw = fs::read_to_string(scores_path)?;
            serde_json::from_str(&raw).map_err(|e| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("invalid doc scores {}: {}", scores_path.display(), e),
                )
            })?
        } else {
            tracing::info!("doc scores not found, using default authority");
            HashMap::new()
        };

        Ok(Self { docs, scores })
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn contains(&self, doc_id: &str) -> bool {
        self.docs.contains_key(doc_id)
    }

    pub fn get(&self, doc_id: &str) -> Option<&DocumentMetadata> {
        self.docs.get(doc_id)
    }

    /// Authority prior for a document, [`DEFAULT_AUTHORITY`] when unknown.
    pub fn authority(&self, doc_id: &str) -> f32 {
        self.scores.get(doc_id).copied().unwrap_or(DEFAULT_AUTHORITY)
    }

    pub fn insert(&mut self, doc_id: String, metadata: DocumentMetadata) {
        self.docs.insert(doc_id, metadata);
    }

    pub fn set_authority(&mut self, doc_id: String, score: f32) {
        self.scores.insert(doc_id, score.clamp(0.0, 1.0));
    }

    pub fn save_metadata(&self, path: &Path) -> io::Result<()> {
        let bytes = serde_json::to_vec(&self.docs).map_err(io::Error::other)?;
        atomic_write(path, &bytes)
    }

    pub fn save_scores(&self, path: &Path) -> io::Result<()> {
        let bytes = serde_json::to_vec(&self.scores).map_err(io::Error::other)?;
        atomic_write(path, &bytes)
    }
}
