//! # papyrus-core
//!
//! Inverted-index search engine over a corpus of scientific documents:
//! frequency-partitioned binary barrels with O(1) posting retrieval, BM25
//! ranking blended with embedding-based semantic expansion and per-document
//! authority priors, prefix autocomplete, and incremental document addition
//! through a delta barrel.
//!
//! This is the core library crate with zero async dependencies. The HTTP
//! facade and the offline build pipeline live in their own crates and embed
//! this one.

/// Text analysis: normalization, tokenization, lemma derivation.
pub mod analysis;
/// Prefix autocomplete buckets, single- and multi-word.
pub mod autocomplete;
/// Binary barrel codec and the serving-time barrel index.
pub mod barrel;
/// Global constants: ranking parameters, thresholds, format widths.
pub mod config;
/// Embedding store for semantic query expansion.
pub mod embeddings;
/// The query engine.
pub mod engine;
/// Index build layer: forward index, inverted index, partitioner.
pub mod index;
/// Incremental document indexing.
pub mod ingest;
/// The word ↔ lemma lexicon.
pub mod lexicon;
/// Document metadata and authority scores.
pub mod metadata;
/// Runtime configuration (`config.json`) and the on-disk layout.
pub mod settings;

pub use engine::{
    EngineTuning, QueryMode, SearchEngine, SearchError, SearchHit, SearchOutcome,
};
pub use ingest::{DocumentPayload, IndexReceipt, IngestError};
pub use settings::Settings;
