//! Prefix autocomplete: single-word buckets and multi-word n-gram buckets.
//!
//! Single-word completions come from buckets keyed by the first two and
//! first three characters of each word, each holding up to
//! [`AUTOCOMPLETE_BUCKET_CAP`] `(word, df)` entries sorted by df descending
//! (`embeddings/autocomplete.json`, entries as `{"w": .., "d": ..}`).
//!
//! Multi-word completions use a separate map built from corpus bigrams and
//! trigrams (`ngram_autocomplete.json`), keyed by every
//! character-granularity prefix of the phrase and capped at
//! [`NGRAM_BUCKET_CAP`] entries.

use crate::config::{AUTOCOMPLETE_BUCKET_CAP, AUTOCOMPLETE_SUGGESTIONS, NGRAM_BUCKET_CAP};
use crate::lexicon::atomic_write;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;

/// Single-word bucket entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordEntry {
    #[serde(rename = "w")]
    pub word: String,
    #[serde(rename = "d")]
    pub df: u32,
}

/// Multi-word bucket entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhraseEntry {
    pub phrase: String,
    pub count: u32,
}

/// The autocomplete index: word buckets plus n-gram buckets.
#[derive(Debug, Default)]
pub struct AutocompleteStore {
    words: HashMap<String, Vec<WordEntry>>,
    ngrams: HashMap<String, Vec<PhraseEntry>>,
}

impl AutocompleteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load both bucket files. Either may be absent or unreadable; the
    /// feature degrades to an empty index with a warning, never a failure.
    pub fn load(words_path: &Path, ngrams_path: &Path) -> Self {
        let words = load_json_map(words_path);
        let ngrams = load_json_map(ngrams_path);
        if !words.is_empty() || !ngrams.is_empty() {
            tracing::info!(
                word_prefixes = words.len(),
                ngram_prefixes = ngrams.len(),
                "autocomplete index loaded"
            );
        }
        Self { words, ngrams }
    }

    pub fn word_prefix_count(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty() && self.ngrams.is_empty()
    }

    /// Top completions for a prefix, default limit
    /// [`AUTOCOMPLETE_SUGGESTIONS`]. A prefix containing a space consults
    /// the n-gram buckets; otherwise the word buckets.
    pub fn suggest(&self, prefix: &str, max: usize) -> Vec<(String, u32)> {
        let prefix = prefix.trim().to_lowercase();
        if prefix.is_empty() || max == 0 {
            return Vec::new();
        }
        if prefix.contains(' ') {
            self.suggest_phrases(&prefix, max)
        } else {
            self.suggest_words(&prefix, max)
        }
    }

    /// Single-word lookup: most specific bucket first (3-char), then the
    /// 2-char bucket, deduplicating by word. Each bucket is already df
    /// descending, and that order is preserved.
    fn suggest_words(&self, prefix: &str, max: usize) -> Vec<(String, u32)> {
        let mut suggestions: Vec<(String, u32)> = Vec::new();
        let chars: Vec<char> = prefix.chars().collect();

        if chars.len() >= 3 {
            let bucket: String = chars[..3].iter().collect();
            if let Some(entries) = self.words.get(&bucket) {
                for entry in entries {
                    if entry.word.starts_with(prefix) {
                        suggestions.push((entry.word.clone(), entry.df));
                        if suggestions.len() >= max {
                            return suggestions;
                        }
                    }
                }
            }
        }

        if suggestions.len() < max && chars.len() >= 2 {
            let bucket: String = chars[..2].iter().collect();
            if let Some(entries) = self.words.get(&bucket) {
                for entry in entries {
                    if entry.word.starts_with(prefix)
                        && !suggestions.iter().any(|(w, _)| w == &entry.word)
                    {
                        suggestions.push((entry.word.clone(), entry.df));
                        if suggestions.len() >= max {
                            break;
                        }
                    }
                }
            }
        }

        suggestions
    }

    /// Multi-word lookup keyed by the whole prefix, falling back to
    /// progressively shorter prefixes down to just past the first word.
    fn suggest_phrases(&self, prefix: &str, max: usize) -> Vec<(String, u32)> {
        if let Some(entries) = self.ngrams.get(prefix) {
            return entries
                .iter()
                .take(max)
                .map(|e| (e.phrase.clone(), e.count))
                .collect();
        }

        let chars: Vec<char> = prefix.chars().collect();
        let first_word_len = chars.iter().position(|&c| c == ' ').unwrap_or(chars.len());
        for end in (first_word_len + 1..chars.len()).rev() {
            let shorter: String = chars[..end].iter().collect();
            if let Some(entries) = self.ngrams.get(&shorter) {
                return entries
                    .iter()
                    .take(max)
                    .map(|e| (e.phrase.clone(), e.count))
                    .collect();
            }
        }
        Vec::new()
    }

    /// Insert or update a word in its 2-char and 3-char buckets. The entry
    /// only enters a full bucket by beating its minimum df.
    pub fn insert_word(&mut self, word: &str, df: u32) {
        let chars: Vec<char> = word.chars().collect();
        for len in [2usize, 3] {
            if chars.len() < len {
                continue;
            }
            let bucket: String = chars[..len].iter().collect();
            let entries = self.words.entry(bucket).or_default();
            if let Some(existing) = entries.iter_mut().find(|e| e.word == word) {
                existing.df = existing.df.max(df);
            } else {
                entries.push(WordEntry {
                    word: word.to_string(),
                    df,
                });
            }
            entries.sort_by(|a, b| b.df.cmp(&a.df));
            entries.truncate(AUTOCOMPLETE_BUCKET_CAP);
        }
    }

    /// Set a phrase's corpus count across all its prefixes (builder path).
    pub fn insert_phrase(&mut self, phrase: &str, count: u32) {
        self.upsert_phrase(phrase, |old| old.max(count));
    }

    /// Increment a phrase's count by one (incremental-indexing path).
    pub fn bump_phrase(&mut self, phrase: &str) {
        self.upsert_phrase(phrase, |old| old + 1);
    }

    fn upsert_phrase(&mut self, phrase: &str, update: impl Fn(u32) -> u32) {
        for prefix in phrase_prefixes(phrase) {
            let entries = self.ngrams.entry(prefix).or_default();
            if let Some(existing) = entries.iter_mut().find(|e| e.phrase == phrase) {
                existing.count = update(existing.count);
            } else {
                entries.push(PhraseEntry {
                    phrase: phrase.to_string(),
                    count: update(0),
                });
            }
            entries.sort_by(|a, b| b.count.cmp(&a.count));
            entries.truncate(NGRAM_BUCKET_CAP);
        }
    }

    pub fn save_words(&self, path: &Path) -> io::Result<()> {
        save_json_map(path, &self.words)
    }

    pub fn save_ngrams(&self, path: &Path) -> io::Result<()> {
        save_json_map(path, &self.ngrams)
    }
}

/// Every lookup prefix a phrase is indexed under: character prefixes of the
/// first word, then of the second word (with the first complete), then of
/// the third.
pub fn phrase_prefixes(phrase: &str) -> Vec<String> {
    let words: Vec<&str> = phrase.split_whitespace().collect();
    let mut prefixes = Vec::new();

    let Some(first) = words.first() else {
        return prefixes;
    };
    let mut base = String::new();
    for c in first.chars() {
        base.push(c);
        prefixes.push(base.clone());
    }

    for (done, word) in words.iter().skip(1).take(2).enumerate() {
        let mut base: String = words[..=done].join(" ");
        base.push(' ');
        for c in word.chars() {
            base.push(c);
            prefixes.push(base.clone());
        }
    }
    prefixes
}

fn load_json_map<T: for<'de> Deserialize<'de>>(path: &Path) -> HashMap<String, Vec<T>> {
    if !path.exists() {
        return HashMap::new();
    }
    match fs::read_to_string(path).map_err(|e| e.to_string()).and_then(|raw| {
        serde_json::from_str::<HashMap<String, Vec<T>>>(&raw).map_err(|e| e.to_string())
    }) {
        Ok(map) => map,
        Err(e) => {
            tracing::warn!("autocomplete bucket file {} unusable: {}", path.display(), e);
            HashMap::new()
        }
    }
}

fn save_json_map<T: Serialize>(path: &Path, map: &HashMap<String, Vec<T>>) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let bytes = serde_json::to_vec(map).map_err(io::Error::other)?;
    atomic_write(path, &bytes)
}
