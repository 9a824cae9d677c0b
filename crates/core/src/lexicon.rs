//! Bidirectional lexicon: surface word ↔ word-ID ↔ lemma-ID.
//!
//! Two equivalent on-disk representations exist. The JSON form
//! (`lexicon.json`) is the authoritative build artifact:
//!
//! ```json
//! { "wordID": {"vaccines": 12}, "lemmaID": {"vaccine": 7},
//!   "wordToLemmaID": {"12": 7} }
//! ```
//!
//! The binary form (`embeddings/lexicon.bin`) exists for load speed:
//! `num_words: u32 LE`, then `num_words` length-prefixed words
//! (`len: u16 LE` + UTF-8 bytes), then `num_words` lemma IDs (`i32 LE`)
//! positionally aligned with the word section. In the binary file a word's
//! ID is its 0-based position. The loader prefers binary and falls back to
//! JSON.

use crate::config::NUMBER_LEMMA_ID;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

pub type WordId = i32;
pub type LemmaId = i32;

/// JSON wire shape of the lexicon.
#[derive(Debug, Default, Serialize, Deserialize)]
struct LexiconJson {
    #[serde(rename = "wordID")]
    word_id: HashMap<String, WordId>,
    #[serde(rename = "lemmaID")]
    lemma_id: HashMap<String, LemmaId>,
    #[serde(rename = "wordToLemmaID")]
    word_to_lemma: HashMap<String, LemmaId>,
}

/// In-memory lexicon with O(1) word → lemma resolution.
///
/// Lemma IDs are dense, assigned at first observation, and never reused.
/// The build pipeline creates the lexicon; at serving time only the
/// incremental indexer extends it.
#[derive(Debug, Default)]
pub struct Lexicon {
    word_ids: HashMap<String, WordId>,
    lemma_ids: HashMap<String, LemmaId>,
    word_to_lemma: HashMap<WordId, LemmaId>,
    next_word_id: WordId,
    next_lemma_id: LemmaId,
}

impl Lexicon {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of known surface words.
    pub fn word_count(&self) -> usize {
        self.word_ids.len()
    }

    /// Resolve a surface word to its lemma ID, or `None` if the word is
    /// unknown. A word with no explicit lemma mapping resolves to its own
    /// word ID.
    pub fn lemma_for_word(&self, word: &str) -> Option<LemmaId> {
        let word_id = *self.word_ids.get(word)?;
        Some(
            self.word_to_lemma
                .get(&word_id)
                .copied()
                .unwrap_or(word_id),
        )
    }

    /// Whether `word` is already present.
    pub fn contains_word(&self, word: &str) -> bool {
        self.word_ids.contains_key(word)
    }

    /// Iterate over `(word, lemma_id)` pairs in unspecified order.
    pub fn words(&self) -> impl Iterator<Item = (&str, LemmaId)> + '_ {
        self.word_ids.iter().map(|(word, word_id)| {
            let lemma = self.word_to_lemma.get(word_id).copied().unwrap_or(*word_id);
            (word.as_str(), lemma)
        })
    }

    /// Add a surface word with its lemma, assigning IDs as needed.
    /// Returns `(word_id, lemma_id)`; idempotent for known words.
    ///
    /// Purely numeric words all share [`NUMBER_LEMMA_ID`].
    pub fn extend(&mut self, word: &str, lemma: &str) -> (WordId, LemmaId) {
        if let Some(&word_id) = self.word_ids.get(word) {
            let lemma_id = self.word_to_lemma.get(&word_id).copied().unwrap_or(word_id);
            return (word_id, lemma_id);
        }

        let word_id = self.next_word_id;
        self.next_word_id += 1;
        self.word_ids.insert(word.to_string(), word_id);

        let lemma_id = if word.bytes().all(|b| b.is_ascii_digit()) {
            NUMBER_LEMMA_ID
        } else if let Some(&id) = self.lemma_ids.get(lemma) {
            id
        } else {
            if self.next_lemma_id == NUMBER_LEMMA_ID {
                self.next_lemma_id += 1;
            }
            let id = self.next_lemma_id;
            self.next_lemma_id += 1;
            self.lemma_ids.insert(lemma.to_string(), id);
            id
        };

        self.word_to_lemma.insert(word_id, lemma_id);
        (word_id, lemma_id)
    }

    /// Load a lexicon, preferring the binary representation.
    pub fn load(binary_path: &Path, json_path: &Path) -> io::Result<Self> {
        match Self::load_binary(binary_path) {
            Ok(lex) => Ok(lex),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::info!("binary lexicon not found, loading JSON lexicon");
                Self::load_json(json_path)
            }
            Err(e) => Err(e),
        }
    }

    /// Load the JSON representation.
    pub fn load_json(path: &Path) -> io::Result<Self> {
        let raw = fs::read_to_string(path)?;
        let json: LexiconJson = serde_json::from_str(&raw).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("invalid lexicon {}: {}", path.display(), e),
            )
        })?;

        let mut word_to_lemma = HashMap::with_capacity(json.word_to_lemma.len());
        for (word_id_str, lemma_id) in &json.word_to_lemma {
            let word_id: WordId = word_id_str.parse().map_err(|_| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("non-numeric word ID key '{}' in lexicon", word_id_str),
                )
            })?;
            word_to_lemma.insert(word_id, *lemma_id);
        }

        let next_word_id = json.word_id.values().copied().max().unwrap_or(-1) + 1;
        let next_lemma_id = json.lemma_id.values().copied().max().unwrap_or(-1) + 1;

        Ok(Self {
            word_ids: json.word_id,
            lemma_ids: json.lemma_id,
            word_to_lemma,
            next_word_id,
            next_lemma_id,
        })
    }

    /// Load the binary representation. Word ID = position in the file.
    pub fn load_binary(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);

        let mut u32_buf = [0u8; 4];
        reader.read_exact(&mut u32_buf)?;
        let num_words = u32::from_le_bytes(u32_buf) as usize;

        let mut words = Vec::with_capacity(num_words);
        let mut len_buf = [0u8; 2];
        for _ in 0..num_words {
            reader.read_exact(&mut len_buf)?;
            let len = u16::from_le_bytes(len_buf) as usize;
            let mut bytes = vec![0u8; len];
            reader.read_exact(&mut bytes)?;
            let word = String::from_utf8(bytes).map_err(|_| {
                io::Error::new(io::ErrorKind::InvalidData, "non-UTF8 word in binary lexicon")
            })?;
            words.push(word);
        }

        let mut lexicon = Lexicon::new();
        let mut i32_buf = [0u8; 4];
        for (position, word) in words.into_iter().enumerate() {
            reader.read_exact(&mut i32_buf)?;
            let lemma_id = i32::from_le_bytes(i32_buf);
            let word_id = position as WordId;
            lexicon.word_ids.insert(word, word_id);
            lexicon.word_to_lemma.insert(word_id, lemma_id);
            lexicon.next_lemma_id = lexicon.next_lemma_id.max(lemma_id + 1);
        }
        lexicon.next_word_id = num_words as WordId;

        Ok(lexicon)
    }

    /// Write the JSON representation atomically (temp file + rename).
    pub fn save_json(&self, path: &Path) -> io::Result<()> {
        let json = LexiconJson {
            word_id: self.word_ids.clone(),
            lemma_id: self.lemma_ids.clone(),
            word_to_lemma: self
                .word_to_lemma
                .iter()
                .map(|(w, l)| (w.to_string(), *l))
                .collect(),
        };
        let bytes = serde_json::to_vec(&json).map_err(io::Error::other)?;
        atomic_write(path, &bytes)
    }

    /// Write the binary representation atomically, sorted by word so the
    /// positional word-ID invariant holds per file.
    pub fn save_binary(&self, path: &Path) -> io::Result<()> {
        let mut entries: Vec<(&String, LemmaId)> = self
            .word_ids
            .iter()
            .map(|(word, word_id)| {
                let lemma = self.word_to_lemma.get(word_id).copied().unwrap_or(*word_id);
                (word, lemma)
            })
            .collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(b.0));

        let tmp = tmp_path(path);
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            writer.write_all(&(entries.len() as u32).to_le_bytes())?;
            for (word, _) in &entries {
                let bytes = word.as_bytes();
                if bytes.len() > u16::MAX as usize {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        format!("word too long for binary lexicon: {} bytes", bytes.len()),
                    ));
                }
                writer.write_all(&(bytes.len() as u16).to_le_bytes())?;
                writer.write_all(bytes)?;
            }
            for (_, lemma_id) in &entries {
                writer.write_all(&lemma_id.to_le_bytes())?;
            }
            writer.flush()?;
            writer.get_mut().sync_all()?;
        }
        fs::rename(&tmp, path)
    }
}

/// Write `bytes` to `path` via a temp file in the same directory + rename.
pub(crate) fn atomic_write(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let tmp = tmp_path(path);
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)
}

fn tmp_path(path: &Path) -> std::path::PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(".tmp");
    std::path::PathBuf::from(os)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Lexicon {
        let mut lex = Lexicon::new();
        lex.extend("vaccine", "vaccine");
        lex.extend("vaccines", "vaccine");
        lex.extend("covid", "covid");
        lex.extend("2021", "2021");
        lex
    }

    #[test]
    fn test_words_sharing_a_lemma() {
        let lex = sample();
        assert_eq!(lex.lemma_for_word("vaccine"), lex.lemma_for_word("vaccines"));
        assert_ne!(lex.lemma_for_word("vaccine"), lex.lemma_for_word("covid"));
    }

    #[test]
    fn test_unknown_word_is_absent() {
        let lex = sample();
        assert_eq!(lex.lemma_for_word("zxzz"), None);
    }

    #[test]
    fn test_extend_is_idempotent() {
        let mut lex = sample();
        let first = lex.extend("covid", "covid");
        let second = lex.extend("covid", "covid");
        assert_eq!(first, second);
        assert_eq!(lex.word_count(), 4);
    }

    #[test]
    fn test_numeric_words_share_number_lemma() {
        let mut lex = sample();
        let (_, a) = lex.extend("2021", "2021");
        let (_, b) = lex.extend("59000", "59000");
        assert_eq!(a, NUMBER_LEMMA_ID);
        assert_eq!(b, NUMBER_LEMMA_ID);
    }

    #[test]
    fn test_json_round_trip() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("lexicon.json");
        let lex = sample();
        lex.save_json(&path).unwrap();

        let loaded = Lexicon::load_json(&path).unwrap();
        assert_eq!(loaded.word_count(), lex.word_count());
        for word in ["vaccine", "vaccines", "covid", "2021"] {
            assert_eq!(loaded.lemma_for_word(word), lex.lemma_for_word(word));
        }
    }

    #[test]
    fn test_binary_round_trip_preserves_lemma_ids() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("lexicon.bin");
        let lex = sample();
        lex.save_binary(&path).unwrap();

        let loaded = Lexicon::load_binary(&path).unwrap();
        assert_eq!(loaded.word_count(), lex.word_count());
        // Word IDs are positional per file; lemma IDs must survive exactly.
        for word in ["vaccine", "vaccines", "covid"] {
            assert_eq!(loaded.lemma_for_word(word), lex.lemma_for_word(word));
        }
    }

    #[test]
    fn test_load_prefers_binary_falls_back_to_json() {
        let tmp = tempfile::TempDir::new().unwrap();
        let bin = tmp.path().join("lexicon.bin");
        let json = tmp.path().join("lexicon.json");
        sample().save_json(&json).unwrap();

        let loaded = Lexicon::load(&bin, &json).unwrap();
        assert!(loaded.lemma_for_word("vaccine").is_some());

        sample().save_binary(&bin).unwrap();
        let loaded = Lexicon::load(&bin, &json).unwrap();
        assert!(loaded.lemma_for_word("vaccine").is_some());
    }

    #[test]
    fn test_extension_after_load_continues_id_sequence() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("lexicon.json");
        sample().save_json(&path).unwrap();

        let mut loaded = Lexicon::load_json(&path).unwrap();
        let before = loaded.lemma_for_word("covid").unwrap();
        let (_, new_lemma) = loaded.extend("zxzz", "zxzz");
        assert_ne!(new_lemma, before);
        assert_eq!(loaded.lemma_for_word("zxzz"), Some(new_lemma));
    }
}
