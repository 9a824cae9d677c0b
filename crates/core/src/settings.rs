//! Runtime configuration loaded from `config.json`.
//!
//! The settings object names the data and index directories and the filenames
//! of the build artifacts. A missing config file or missing key is fatal at
//! startup; everything downstream resolves paths through the helpers here so
//! the on-disk layout lives in exactly one place.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Startup configuration, deserialized from `config.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Directory containing the raw document corpus.
    pub data_dir: PathBuf,
    /// Directory where all index artifacts live.
    pub indexes_dir: PathBuf,
    /// Lexicon filename under `indexes_dir`.
    pub lexicon_file: String,
    /// Forward index filename under `indexes_dir`.
    pub forward_index_file: String,
    /// Textual inverted index filename under `indexes_dir`.
    pub inverted_index_file: String,
    /// Directory name (under `indexes_dir`) holding the textual barrels.
    pub barrels_dir: String,
    /// Barrel lookup table filename under `indexes_dir`.
    pub barrel_lookup: String,
    /// Subfolder name searched for under `data_dir` for corpus JSON files.
    pub json_data: String,
}

impl Settings {
    /// Load settings from a `config.json` file. Paths in the file are
    /// resolved relative to the file's parent directory.
    pub fn load(path: &Path) -> io::Result<Self> {
        let raw = fs::read_to_string(path)?;
        let mut settings: Settings = serde_json::from_str(&raw).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("invalid config {}: {}", path.display(), e),
            )
        })?;

        if let Some(base) = path.parent() {
            if settings.data_dir.is_relative() {
                settings.data_dir = base.join(&settings.data_dir);
            }
            if settings.indexes_dir.is_relative() {
                settings.indexes_dir = base.join(&settings.indexes_dir);
            }
        }
        Ok(settings)
    }

    pub fn lexicon_path(&self) -> PathBuf {
        self.indexes_dir.join(&self.lexicon_file)
    }

    pub fn forward_index_path(&self) -> PathBuf {
        self.indexes_dir.join(&self.forward_index_file)
    }

    pub fn inverted_index_path(&self) -> PathBuf {
        self.indexes_dir.join(&self.inverted_index_file)
    }

    pub fn barrels_dir(&self) -> PathBuf {
        self.indexes_dir.join(&self.barrels_dir)
    }

    pub fn barrel_lookup_path(&self) -> PathBuf {
        self.indexes_dir.join(&self.barrel_lookup)
    }

    /// Directory holding the binary barrel pairs (`barrel_K.bin` / `.idx`).
    pub fn binary_barrels_dir(&self) -> PathBuf {
        self.indexes_dir.join("barrels_binary")
    }

    /// Directory holding embeddings, the binary lexicon, autocomplete
    /// buckets, and document authority scores.
    pub fn embeddings_dir(&self) -> PathBuf {
        self.indexes_dir.join("embeddings")
    }

    pub fn binary_lexicon_path(&self) -> PathBuf {
        self.embeddings_dir().join("lexicon.bin")
    }

    pub fn embeddings_bin_path(&self) -> PathBuf {
        self.embeddings_dir().join("embeddings.bin")
    }

    pub fn vocab_path(&self) -> PathBuf {
        self.embeddings_dir().join("vocab.json")
    }

    pub fn autocomplete_path(&self) -> PathBuf {
        self.embeddings_dir().join("autocomplete.json")
    }

    pub fn doc_scores_path(&self) -> PathBuf {
        self.embeddings_dir().join("doc_scores.json")
    }

    pub fn ngram_autocomplete_path(&self) -> PathBuf {
        self.indexes_dir.join("ngram_autocomplete.json")
    }

    pub fn document_metadata_path(&self) -> PathBuf {
        self.indexes_dir.join("document_metadata.json")
    }

    /// Textual barrel path for a primary barrel ID, or the delta twin for
    /// [`crate::config::NEW_DOCS_BARREL`].
    pub fn json_barrel_path(&self, barrel_id: u8) -> PathBuf {
        self.barrels_dir().join(format!(
            "inverted_barrel_{}.json",
            barrel_name(barrel_id)
        ))
    }

    pub fn barrel_bin_path(&self, barrel_id: u8) -> PathBuf {
        self.binary_barrels_dir()
            .join(format!("barrel_{}.bin", barrel_name(barrel_id)))
    }

    pub fn barrel_idx_path(&self, barrel_id: u8) -> PathBuf {
        self.binary_barrels_dir()
            .join(format!("barrel_{}.idx", barrel_name(barrel_id)))
    }

    /// Locate the corpus JSON folder: the first directory named `json_data`
    /// anywhere under `data_dir`.
    pub fn find_corpus_dir(&self) -> io::Result<PathBuf> {
        fn walk(dir: &Path, needle: &str) -> Option<PathBuf> {
            let entries = fs::read_dir(dir).ok()?;
            let mut subdirs = Vec::new();
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    if entry.file_name().to_string_lossy() == needle {
                        return Some(path);
                    }
                    subdirs.push(path);
                }
            }
            subdirs.into_iter().find_map(|d| walk(&d, needle))
        }

        walk(&self.data_dir, &self.json_data).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!(
                    "could not find '{}' folder under {}",
                    self.json_data,
                    self.data_dir.display()
                ),
            )
        })
    }
}

/// File-name fragment for a barrel ID: `0..=9` use the digit, the delta
/// barrel uses `new_docs`.
pub fn barrel_name(barrel_id: u8) -> String {
    if barrel_id == crate::config::NEW_DOCS_BARREL {
        "new_docs".to_string()
    } else {
        barrel_id.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(dir: &Path) -> PathBuf {
        let path = dir.join("config.json");
        fs::write(
            &path,
            r#"{
                "data_dir": "data",
                "indexes_dir": "indexes",
                "lexicon_file": "lexicon.json",
                "forward_index_file": "forward_index.txt",
                "inverted_index_file": "inverted_index.txt",
                "barrels_dir": "barrels",
                "barrel_lookup": "barrel_lookup.json",
                "json_data": "pmc_json"
            }"#,
        )
        .unwrap();
        path
    }

    #[test]
    fn test_load_resolves_relative_paths() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = write_config(tmp.path());
        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.indexes_dir, tmp.path().join("indexes"));
        assert_eq!(
            settings.lexicon_path(),
            tmp.path().join("indexes").join("lexicon.json")
        );
    }

    #[test]
    fn test_missing_config_is_fatal() {
        let tmp = tempfile::TempDir::new().unwrap();
        let result = Settings::load(&tmp.path().join("nope.json"));
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_key_is_fatal() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("config.json");
        fs::write(&path, r#"{"data_dir": "data"}"#).unwrap();
        assert!(Settings::load(&path).is_err());
    }

    #[test]
    fn test_barrel_paths_name_delta_barrel() {
        let tmp = tempfile::TempDir::new().unwrap();
        let settings = Settings::load(&write_config(tmp.path())).unwrap();
        assert!(settings
            .barrel_bin_path(3)
            .ends_with("barrels_binary/barrel_3.bin"));
        assert!(settings
            .barrel_idx_path(crate::config::NEW_DOCS_BARREL)
            .ends_with("barrels_binary/barrel_new_docs.idx"));
    }

    #[test]
    fn test_find_corpus_dir_walks_nested_layout() {
        let tmp = tempfile::TempDir::new().unwrap();
        let settings = Settings::load(&write_config(tmp.path())).unwrap();
        let nested = tmp.path().join("data/archive/2020-03/pmc_json");
        fs::create_dir_all(&nested).unwrap();
        assert_eq!(settings.find_corpus_dir().unwrap(), nested);
    }
}
