//! Global configuration constants for the search engine.
//!
//! All ranking parameters, partition thresholds, and format widths are defined
//! here. These are compile-time defaults; the ranking subset can be overridden
//! per engine instance via [`crate::engine::EngineTuning`], and filesystem
//! locations come from [`crate::settings::Settings`].

/// BM25 Okapi term frequency saturation parameter.
///
/// Controls how quickly term frequency saturates. Standard range: 1.2–2.0.
pub const BM25_K1: f64 = 1.5;

/// BM25 Okapi document length normalization parameter.
///
/// 0.0 = no length normalization, 1.0 = full normalization.
pub const BM25_B: f64 = 0.75;

/// Number of results returned by a search query.
pub const TOP_K: usize = 20;

/// Weight of the BM25 component in the combined document score.
pub const TFIDF_WEIGHT: f64 = 0.5;

/// Weight of the semantic (query-expansion) component in the combined score.
pub const SEMANTIC_WEIGHT: f64 = 0.3;

/// Weight of the per-document authority prior in the combined score.
pub const AUTHORITY_WEIGHT: f64 = 0.2;

/// Number of similar words attached per original query term during expansion.
pub const TOP_SIMILAR_WORDS: usize = 3;

/// Cosine similarity below which an expansion candidate is discarded.
pub const SIMILARITY_THRESHOLD: f32 = 0.5;

/// Multiplier applied to an expansion candidate's similarity to form its
/// query weight. Original terms carry weight 1.0.
pub const EXPANSION_WEIGHT: f64 = 0.5;

/// Embedding dimensionality the engine is built for. An embeddings file with
/// any other dimension disables semantic expansion.
pub const EMBEDDING_DIM: usize = 50;

/// Authority score assumed for documents absent from the score table.
pub const DEFAULT_AUTHORITY: f32 = 0.5;

/// Number of primary barrels (0..=9).
pub const NUM_BARRELS: usize = 10;

/// Barrel ID reserved for the incremental "new docs" delta barrel.
pub const NEW_DOCS_BARREL: u8 = 10;

/// A lemma with df strictly above this goes to the hot barrel (barrel 0).
/// df == 10_000 itself is warm.
pub const HOT_DF_THRESHOLD: i32 = 10_000;

/// A lemma with df strictly above this (and not hot) goes to a warm barrel
/// (1..=6). df == 1_000 itself is cold (7..=9).
pub const WARM_DF_THRESHOLD: i32 = 1_000;

/// On-disk width of a document ID inside a posting block. IDs shorter than
/// this are right-padded with NUL bytes; logical IDs are at most 19 bytes.
pub const DOC_ID_SIZE: usize = 20;

/// Maximum logical document ID length in bytes.
pub const MAX_DOC_ID_LEN: usize = 19;

/// Body lemmas per document retained in the forward index.
pub const BODY_TERM_LIMIT: usize = 5_000;

/// Maximum entries kept per autocomplete prefix bucket.
pub const AUTOCOMPLETE_BUCKET_CAP: usize = 50;

/// Default number of autocomplete suggestions returned.
pub const AUTOCOMPLETE_SUGGESTIONS: usize = 5;

/// Number of similar words returned by the standalone `similar` operation.
pub const SIMILAR_WORDS_RESULT_COUNT: usize = 10;

/// Lemma ID shared by all purely-numeric tokens.
pub const NUMBER_LEMMA_ID: i32 = 9_999;

/// Minimum corpus frequency for a bigram/trigram to enter the n-gram index.
pub const NGRAM_MIN_FREQ: u32 = 5;

/// Maximum distinct bigrams (and trigrams) retained by the n-gram builder.
pub const NGRAM_MAX_PHRASES: usize = 50_000;

/// Soft deadline applied to a query when the caller does not supply one.
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 30;

/// Maximum entries kept per multi-word (n-gram) autocomplete prefix bucket.
pub const NGRAM_BUCKET_CAP: usize = 10;
