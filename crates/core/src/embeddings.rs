//! Word-embedding store for semantic query expansion.
//!
//! Binary format (`embeddings/embeddings.bin`, little-endian): header
//! `num_words: u32, dim: u32`, then `num_words × dim` f32 values row-major.
//! A sidecar `vocab.json` maps each word to its 0-based row index.
//!
//! Vectors are L2-normalized at load, so cosine similarity reduces to a dot
//! product. The store is optional: missing files or a dimension other than
//! [`EMBEDDING_DIM`] disable semantic expansion rather than failing startup.

use crate::config::EMBEDDING_DIM;
use ordered_float::OrderedFloat;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::Path;

/// Fixed-dimension embedding matrix with a word → row vocabulary.
pub struct EmbeddingStore {
    /// Row-major matrix, `words.len() × dim`, rows L2-normalized.
    matrix: Vec<f32>,
    dim: usize,
    vocab: HashMap<String, usize>,
    words: Vec<String>,
}

impl EmbeddingStore {
    /// Load the store. Returns `Ok(None)`, meaning semantic expansion is
    /// disabled, when either file is missing or the dimension is not
    /// [`EMBEDDING_DIM`].
    pub fn load(bin_path: &Path, vocab_path: &Path) -> io::Result<Option<Self>> {
        if !bin_path.exists() || !vocab_path.exists() {
            tracing::info!("embeddings not found, semantic expansion disabled");
            return Ok(None);
        }

        let raw = fs::read_to_string(vocab_path)?;
        let vocab: HashMap<String, usize> = serde_json::from_str(&raw).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("invalid vocab {}: {}", vocab_path.display(), e),
            )
        })?;

        let mut reader = BufReader::new(File::open(bin_path)?);
        let mut u32_buf = [0u8; 4];
        reader.read_exact(&mut u32_buf)?;
        let num_words = u32::from_le_bytes(u32_buf) as usize;
        reader.read_exact(&mut u32_buf)?;
        let dim = u32::from_le_bytes(u32_buf) as usize;

        if dim != EMBEDDING_DIM {
            tracing::warn!(
                expected = EMBEDDING_DIM,
                got = dim,
                "embedding dimension mismatch, semantic expansion disabled"
            );
            return Ok(None);
        }

        let mut bytes = vec![0u8; num_words * dim * 4];
        reader.read_exact(&mut bytes)?;
        let mut matrix = Vec::with_capacity(num_words * dim);
        for chunk in bytes.chunks_exact(4) {
            matrix.push(f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
        }

        // Normalize rows so cosine similarity is a dot product.
        for row in matrix.chunks_exact_mut(dim) {
            let norm = row.iter().map(|v| v * v).sum::<f32>().sqrt();
            if norm > 0.0 {
                for v in row {
                    *v /= norm;
                }
            }
        }

        let mut words = vec![String::new(); num_words];
        for (word, &idx) in &vocab {
            if idx < num_words {
                words[idx] = word.clone();
            } else {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("vocab index {} out of range for '{}'", idx, word),
                ));
            }
        }

        tracing::info!(words = num_words, dim, "embeddings loaded");
        Ok(Some(Self {
            matrix,
            dim,
            vocab,
            words,
        }))
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn contains(&self, word: &str) -> bool {
        self.vocab.contains_key(word)
    }

    fn row(&self, idx: usize) -> &[f32] {
        &self.matrix[idx * self.dim..(idx + 1) * self.dim]
    }

    /// The `k` words most similar to `word` by dot product (cosine, since
    /// rows are normalized), highest first. Ties break toward the lower
    /// vocabulary index. The word itself is excluded; an unknown word
    /// returns an empty list.
    pub fn find_similar(&self, word: &str, k: usize) -> Vec<(String, f32)> {
        let Some(&word_idx) = self.vocab.get(word) else {
            return Vec::new();
        };
        if k == 0 {
            return Vec::new();
        }
        let query = self.row(word_idx);

        // Bounded min-heap of size k: O(V log k) over the vocabulary.
        let mut heap: BinaryHeap<Reverse<(OrderedFloat<f32>, Reverse<usize>)>> =
            BinaryHeap::with_capacity(k + 1);
        for idx in 0..self.words.len() {
            if idx == word_idx {
                continue;
            }
            let sim = dot(query, self.row(idx));
            heap.push(Reverse((OrderedFloat(sim), Reverse(idx))));
            if heap.len() > k {
                heap.pop();
            }
        }

        let mut results: Vec<(usize, f32)> = heap
            .into_iter()
            .map(|Reverse((sim, Reverse(idx)))| (idx, sim.0))
            .collect();
        results.sort_unstable_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        results
            .into_iter()
            .map(|(idx, sim)| (self.words[idx].clone(), sim))
            .collect()
    }

    /// Check the normalization invariant: every row norm within `tol` of 1.
    /// Zero vectors (absent words) are exempt.
    pub fn max_norm_error(&self) -> f32 {
        self.matrix
            .chunks_exact(self.dim)
            .map(|row| {
                let norm = row.iter().map(|v| v * v).sum::<f32>().sqrt();
                if norm == 0.0 {
                    0.0
                } else {
                    (norm - 1.0).abs()
                }
            })
            .fold(0.0, f32::max)
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Write an embeddings file (header + row-major f32 matrix) and its vocab.
/// Used by the build pipeline and tests; vectors are written as given.
pub fn write_embeddings(
    bin_path: &Path,
    vocab_path: &Path,
    entries: &[(String, Vec<f32>)],
    dim: usize,
) -> io::Result<()> {
    if let Some(parent) = bin_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut bytes = Vec::with_capacity(8 + entries.len() * dim * 4);
    bytes.extend_from_slice(&(entries.len() as u32).to_le_bytes());
    bytes.extend_from_slice(&(dim as u32).to_le_bytes());
    for (word, vector) in entries {
        if vector.len() != dim {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("vector for '{}' has {} dims, expected {}", word, vector.len(), dim),
            ));
        }
        for value in vector {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
    }
    crate::lexicon::atomic_write(bin_path, &bytes)?;

    let vocab: HashMap<&str, usize> = entries
        .iter()
        .enumerate()
        .map(|(idx, (word, _))| (word.as_str(), idx))
        .collect();
    let vocab_bytes = serde_json::to_vec(&vocab).map_err(io::Error::other)?;
    crate::lexicon::atomic_write(vocab_path, &vocab_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_vec(direction: usize, scale: f32) -> Vec<f32> {
        let mut v = vec![0.0f32; EMBEDDING_DIM];
        v[direction] = scale;
        v
    }

    fn blend(a: usize, b: usize, wa: f32, wb: f32) -> Vec<f32> {
        let mut v = vec![0.0f32; EMBEDDING_DIM];
        v[a] = wa;
        v[b] = wb;
        v
    }

    fn store(entries: &[(String, Vec<f32>)]) -> EmbeddingStore {
        let tmp = tempfile::TempDir::new().unwrap();
        let bin = tmp.path().join("embeddings.bin");
        let vocab = tmp.path().join("vocab.json");
        write_embeddings(&bin, &vocab, entries, EMBEDDING_DIM).unwrap();
        EmbeddingStore::load(&bin, &vocab).unwrap().unwrap()
    }

    #[test]
    fn test_vectors_normalized_on_load() {
        let store = store(&[
            ("vaccine".into(), unit_vec(0, 5.0)),
            ("shot".into(), blend(0, 1, 3.0, 1.0)),
        ]);
        assert!(store.max_norm_error() < 1e-4);
    }

    #[test]
    fn test_find_similar_orders_by_cosine() {
        let store = store(&[
            ("vaccine".into(), unit_vec(0, 1.0)),
            ("shot".into(), blend(0, 1, 0.8, 0.6)),
            ("banana".into(), unit_vec(2, 1.0)),
        ]);
        let similar = store.find_similar("vaccine", 2);
        assert_eq!(similar[0].0, "shot");
        assert!(similar[0].1 > 0.7);
        assert!(similar[1].1 < 0.1);
    }

    #[test]
    fn test_tie_breaks_toward_lower_index() {
        let store = store(&[
            ("q".into(), unit_vec(0, 1.0)),
            ("first".into(), unit_vec(1, 1.0)),
            ("second".into(), unit_vec(2, 1.0)),
            ("third".into(), unit_vec(3, 1.0)),
        ]);
        // All candidates tie at similarity 0; lower indices win.
        let similar = store.find_similar("q", 2);
        assert_eq!(similar[0].0, "first");
        assert_eq!(similar[1].0, "second");
    }

    #[test]
    fn test_unknown_word_and_k_zero() {
        let store = store(&[("vaccine".into(), unit_vec(0, 1.0))]);
        assert!(store.find_similar("zzz", 3).is_empty());
        assert!(store.find_similar("vaccine", 0).is_empty());
    }

    #[test]
    fn test_dimension_mismatch_disables_store() {
        let tmp = tempfile::TempDir::new().unwrap();
        let bin = tmp.path().join("embeddings.bin");
        let vocab = tmp.path().join("vocab.json");
        write_embeddings(
            &bin,
            &vocab,
            &[("w".into(), vec![1.0, 0.0, 0.0])],
            3,
        )
        .unwrap();
        assert!(EmbeddingStore::load(&bin, &vocab).unwrap().is_none());
    }

    #[test]
    fn test_missing_files_disable_store() {
        let tmp = tempfile::TempDir::new().unwrap();
        let loaded = EmbeddingStore::load(
            &tmp.path().join("embeddings.bin"),
            &tmp.path().join("vocab.json"),
        )
        .unwrap();
        assert!(loaded.is_none());
    }
}
