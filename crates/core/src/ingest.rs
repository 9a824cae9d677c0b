//! Incremental document indexing.
//!
//! `add_document` makes a document searchable without rebuilding the primary
//! barrels: postings go to the append-only delta barrel, the lexicon grows
//! in place, and the forward index, metadata, and autocomplete buckets are
//! patched. The contract is that the document is searchable when the call
//! returns.
//!
//! Writes are serialized through the engine's writer mutex: at most one
//! insert in flight. Persistence order is benign-first: the lexicon (words
//! without postings are harmless) is written before the delta pair, and the
//! delta snapshot readers see is only swapped once both delta files are in
//! place. A failure partway leaves every artifact self-consistent.

use crate::analysis;
use crate::config::MAX_DOC_ID_LEN;
use crate::engine::SearchEngine;
use crate::index::forward::{self, ForwardRecord};
use crate::lexicon::{LemmaId, Lexicon};
use crate::metadata::DocumentMetadata;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::io;
use std::time::Instant;

/// Input to `add_document`.
#[derive(Debug, Clone, Default)]
pub struct DocumentPayload {
    /// Caller-assigned ID; generated when absent.
    pub doc_id: Option<String>,
    pub title: String,
    pub abstract_text: String,
    pub body: String,
    pub authors: Vec<String>,
}

/// Statistics returned by a successful insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexReceipt {
    pub doc_id: String,
    pub elapsed_ms: u64,
    pub total_terms: u32,
    pub unique_terms: u32,
    pub new_lexicon_entries: u32,
}

/// Error surface of the incremental indexer.
#[derive(Debug)]
pub enum IngestError {
    /// The supplied document ID is not encodable (empty, too long,
    /// forbidden characters).
    InvalidDocId(String),
    /// A document with this ID is already indexed.
    DuplicateDocId(String),
    /// The document contained no indexable terms.
    EmptyDocument,
    Io(io::Error),
}

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestError::InvalidDocId(msg) => write!(f, "invalid document ID: {}", msg),
            IngestError::DuplicateDocId(id) => write!(f, "document '{}' already indexed", id),
            IngestError::EmptyDocument => write!(f, "document has no indexable terms"),
            IngestError::Io(e) => write!(f, "indexing failed: {}", e),
        }
    }
}

impl std::error::Error for IngestError {}

impl From<io::Error> for IngestError {
    fn from(e: io::Error) -> Self {
        IngestError::Io(e)
    }
}

impl SearchEngine {
    /// Index one document incrementally. Searchable upon successful return.
    pub fn add_document(&self, payload: DocumentPayload) -> Result<IndexReceipt, IngestError> {
        let _writer = self.writer.lock();
        let started = Instant::now();

        let doc_id = self.resolve_doc_id(payload.doc_id.as_deref())?;

        // Tokenize each section, keeping surface forms for autocomplete.
        let title_words = collect_tokens(&payload.title);
        let abstract_words = collect_tokens(&payload.abstract_text);
        let body_words = collect_tokens(&payload.body);

        let mut new_words = 0u32;
        let (title_lemmas, abstract_lemmas, body_lemmas) = {
            let mut lexicon = self.lexicon.write();
            (
                resolve_lemmas(&mut lexicon, &title_words, &mut new_words),
                resolve_lemmas(&mut lexicon, &abstract_words, &mut new_words),
                resolve_lemmas(&mut lexicon, &body_words, &mut new_words),
            )
        };

        let total_terms =
            (title_lemmas.len() + abstract_lemmas.len() + body_lemmas.len()) as u32;
        if total_terms == 0 {
            return Err(IngestError::EmptyDocument);
        }

        let mut freqs: HashMap<LemmaId, i32> = HashMap::new();
        for &lemma in title_lemmas
            .iter()
            .chain(&abstract_lemmas)
            .chain(&body_lemmas)
        {
            *freqs.entry(lemma).or_insert(0) += 1;
        }
        let unique_terms = freqs.len() as u32;

        // Persist the grown lexicon first: words without postings are
        // harmless if a later step fails.
        if new_words > 0 {
            std::fs::create_dir_all(self.settings.embeddings_dir())?;
            let lexicon = self.lexicon.read();
            lexicon.save_json(&self.settings.lexicon_path())?;
            lexicon.save_binary(&self.settings.binary_lexicon_path())?;
        }

        // Delta barrel write + snapshot publish: after this the document is
        // visible to queries.
        self.barrels.append_delta_document(&doc_id, &freqs)?;

        let record = ForwardRecord::new(
            doc_id.clone(),
            title_lemmas,
            abstract_lemmas,
            body_lemmas,
        );
        forward::append_record(&self.settings.forward_index_path(), &record)?;
        self.stats.write().observe(doc_id.clone(), total_terms);

        {
            let mut metadata = self.metadata.write();
            metadata.insert(
                doc_id.clone(),
                DocumentMetadata {
                    title: if payload.title.is_empty() {
                        format!("Document {}", doc_id)
                    } else {
                        truncate_chars(&payload.title, 500)
                    },
                    authors: payload.authors,
                    abstract_text: truncate_chars(&payload.abstract_text, 1000),
                },
            );
            metadata.save_metadata(&self.settings.document_metadata_path())?;
        }

        self.update_autocomplete(&title_words, &abstract_words, &body_words)?;

        let receipt = IndexReceipt {
            doc_id,
            elapsed_ms: started.elapsed().as_millis() as u64,
            total_terms,
            unique_terms,
            new_lexicon_entries: new_words,
        };
        tracing::info!(
            doc_id = %receipt.doc_id,
            total_terms = receipt.total_terms,
            unique_terms = receipt.unique_terms,
            new_terms = receipt.new_lexicon_entries,
            elapsed_ms = receipt.elapsed_ms,
            "document indexed"
        );
        Ok(receipt)
    }

    /// Validate a caller-supplied ID or derive a fresh one.
    fn resolve_doc_id(&self, supplied: Option<&str>) -> Result<String, IngestError> {
        if let Some(raw) = supplied {
            let id = raw.trim();
            if id.is_empty() {
                return Err(IngestError::InvalidDocId("empty".into()));
            }
            if id.len() > MAX_DOC_ID_LEN {
                return Err(IngestError::InvalidDocId(format!(
                    "'{}' exceeds {} bytes",
                    id, MAX_DOC_ID_LEN
                )));
            }
            if id.bytes().any(|b| b == 0 || b == b'|') || id.contains(char::is_whitespace) {
                return Err(IngestError::InvalidDocId(format!(
                    "'{}' contains forbidden characters",
                    id
                )));
            }
            if self.is_known_doc(id) {
                return Err(IngestError::DuplicateDocId(id.to_string()));
            }
            return Ok(id.to_string());
        }

        // DOC_ + 12 hex chars stays well under the 19-byte limit; retry on
        // the astronomically unlikely collision.
        loop {
            let uuid = uuid::Uuid::new_v4().simple().to_string();
            let id = format!("DOC_{}", uuid[..12].to_uppercase());
            if !self.is_known_doc(&id) {
                return Ok(id);
            }
        }
    }

    fn is_known_doc(&self, doc_id: &str) -> bool {
        self.stats.read().contains(doc_id) || self.metadata.read().contains(doc_id)
    }

    /// Feed new surface words into the prefix buckets and observed
    /// bigrams/trigrams into the n-gram buckets, then persist both.
    fn update_autocomplete(
        &self,
        title_words: &[String],
        abstract_words: &[String],
        body_words: &[String],
    ) -> io::Result<()> {
        let mut autocomplete = self.autocomplete.write();

        let unique: HashSet<&str> = title_words
            .iter()
            .chain(abstract_words)
            .chain(body_words)
            .map(String::as_str)
            .collect();
        for word in unique {
            autocomplete.insert_word(word, 1);
        }

        // N-grams never span section boundaries.
        for words in [title_words, abstract_words, body_words] {
            for pair in words.windows(2) {
                autocomplete.bump_phrase(&format!("{} {}", pair[0], pair[1]));
            }
            for triple in words.windows(3) {
                autocomplete.bump_phrase(&format!("{} {} {}", triple[0], triple[1], triple[2]));
            }
        }

        autocomplete.save_words(&self.settings.autocomplete_path())?;
        autocomplete.save_ngrams(&self.settings.ngram_autocomplete_path())
    }
}

fn collect_tokens(text: &str) -> Vec<String> {
    analysis::index_tokens(text).iter().map(String::from).collect()
}

fn resolve_lemmas(lexicon: &mut Lexicon, words: &[String], new_words: &mut u32) -> Vec<LemmaId> {
    words
        .iter()
        .map(|word| {
            if let Some(lemma) = lexicon.lemma_for_word(word) {
                lemma
            } else {
                *new_words += 1;
                lexicon.extend(word, &analysis::lemma_of(word)).1
            }
        })
        .collect()
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
