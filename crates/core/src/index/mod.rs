//! Index build layer: forward index, inverted index, and barrel partitioning.
//!
//! The build flow is forward → inverted → partition: documents become per-doc
//! lemma sequences, which become per-lemma posting lists, which are split
//! into ten frequency-partitioned barrels plus a total lookup table.

/// Forward index: per-document lemma sequences and corpus statistics.
pub mod forward;
/// Inverted index: lemma → posting list, built from the forward index.
pub mod inverted;
/// Barrel partitioner: frequency classes, JSON barrels, and the lookup table.
pub mod partition;

pub use forward::{CorpusStats, ForwardRecord};
pub use inverted::{InvertedIndex, Posting, PostingList};
pub use partition::{barrel_for, BarrelLookup};
