//! Inverted index: lemma-ID → posting list.
//!
//! Built in a single pass over the forward index. Posting lists preserve
//! ingestion order (the order documents were scanned) and are never sorted
//! by document ID; downstream consumers must not rely on lexicographic order.
//!
//! Text format, one line per lemma:
//!
//! ```text
//! lemma_id|df|doc1:tf1,doc2:tf2,...
//! ```

use crate::index::forward;
use crate::lexicon::LemmaId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// A single posting: document ID plus the term's frequency in that document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub doc_id: String,
    pub tf: i32,
}

/// A lemma's posting list with its cached document frequency.
///
/// Serialized into JSON barrels as `{"df": .., "docs": [{"doc_id","tf"}]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostingList {
    pub df: i32,
    pub docs: Vec<Posting>,
}

impl PostingList {
    /// Append a posting if the document is not already present.
    /// Returns `true` when the posting was added (df incremented).
    pub fn push_unique(&mut self, doc_id: &str, tf: i32) -> bool {
        if self.docs.iter().any(|p| p.doc_id == doc_id) {
            return false;
        }
        self.docs.push(Posting {
            doc_id: doc_id.to_string(),
            tf,
        });
        self.df += 1;
        true
    }
}

/// In-memory inverted index keyed by lemma ID.
#[derive(Debug, Default)]
pub struct InvertedIndex {
    pub postings: HashMap<LemmaId, Vec<Posting>>,
    pub doc_count: u64,
}

impl InvertedIndex {
    /// Build from a forward index file in one pass.
    pub fn build_from_forward(forward_path: &Path) -> io::Result<Self> {
        let mut index = Self::default();
        forward::scan(forward_path, |record| {
            let mut freqs: HashMap<LemmaId, i32> = HashMap::new();
            for lemma in record.all_lemmas() {
                *freqs.entry(lemma).or_insert(0) += 1;
            }
            for (lemma, tf) in freqs {
                index.postings.entry(lemma).or_default().push(Posting {
                    doc_id: record.doc_id.clone(),
                    tf,
                });
            }
            index.doc_count += 1;
        })?;
        Ok(index)
    }

    pub fn term_count(&self) -> usize {
        self.postings.len()
    }

    /// Write the textual representation.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        for (lemma, postings) in &self.postings {
            write!(writer, "{}|{}|", lemma, postings.len())?;
            for (i, posting) in postings.iter().enumerate() {
                if i > 0 {
                    writer.write_all(b",")?;
                }
                write!(writer, "{}:{}", posting.doc_id, posting.tf)?;
            }
            writer.write_all(b"\n")?;
        }
        writer.flush()
    }
}

/// Stream each `(lemma_id, df, postings)` line of a textual inverted index
/// through `f`. Malformed posting tokens within a line are skipped;
/// malformed lines are skipped with a warning.
pub fn scan(path: &Path, mut f: impl FnMut(LemmaId, i32, Vec<Posting>)) -> io::Result<()> {
    let reader = BufReader::new(File::open(path)?);
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        let mut parts = line.splitn(3, '|');
        let lemma: Option<LemmaId> = parts.next().and_then(|s| s.parse().ok());
        let df: Option<i32> = parts.next().and_then(|s| s.parse().ok());
        let (Some(lemma), Some(df), Some(postings_str)) = (lemma, df, parts.next()) else {
            tracing::warn!(line = line_no + 1, "skipping malformed inverted index line");
            continue;
        };

        let postings: Vec<Posting> = postings_str
            .split(',')
            .filter(|t| !t.is_empty())
            .filter_map(|token| {
                let (doc_id, tf) = token.rsplit_once(':')?;
                Some(Posting {
                    doc_id: doc_id.to_string(),
                    tf: tf.parse().ok()?,
                })
            })
            .collect();
        f(lemma, df, postings);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::forward::{write_all, ForwardRecord};

    fn build_toy_index(tmp: &tempfile::TempDir) -> InvertedIndex {
        let forward_path = tmp.path().join("forward_index.txt");
        // Doc A: lemmas [1, 1, 2]; doc B: [2]; doc C: [1, 3].
        write_all(
            &forward_path,
            &[
                ForwardRecord::new("A".into(), vec![1], vec![], vec![1, 2]),
                ForwardRecord::new("B".into(), vec![], vec![], vec![2]),
                ForwardRecord::new("C".into(), vec![1], vec![], vec![3]),
            ],
        )
        .unwrap();
        InvertedIndex::build_from_forward(&forward_path).unwrap()
    }

    #[test]
    fn test_build_counts_term_frequencies() {
        let tmp = tempfile::TempDir::new().unwrap();
        let index = build_toy_index(&tmp);

        assert_eq!(index.doc_count, 3);
        let lemma1 = &index.postings[&1];
        assert_eq!(lemma1.len(), 2);
        let a = lemma1.iter().find(|p| p.doc_id == "A").unwrap();
        assert_eq!(a.tf, 2);
    }

    #[test]
    fn test_posting_order_is_ingestion_order() {
        let tmp = tempfile::TempDir::new().unwrap();
        let index = build_toy_index(&tmp);
        let ids: Vec<&str> = index.postings[&2].iter().map(|p| p.doc_id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B"]);
    }

    #[test]
    fn test_save_and_scan_round_trip() {
        let tmp = tempfile::TempDir::new().unwrap();
        let index = build_toy_index(&tmp);
        let path = tmp.path().join("inverted_index.txt");
        index.save(&path).unwrap();

        let mut lemmas = HashMap::new();
        scan(&path, |lemma, df, postings| {
            assert_eq!(df as usize, postings.len());
            lemmas.insert(lemma, postings);
        })
        .unwrap();
        assert_eq!(lemmas.len(), index.term_count());
        assert_eq!(lemmas[&1].len(), 2);
    }

    #[test]
    fn test_scan_skips_malformed_tokens() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("inverted_index.txt");
        std::fs::write(&path, "5|2|A:1,broken,B:3\nnot a line\n").unwrap();

        let mut collected = Vec::new();
        scan(&path, |lemma, _, postings| {
            collected.push((lemma, postings.len()));
        })
        .unwrap();
        assert_eq!(collected, vec![(5, 2)]);
    }

    #[test]
    fn test_push_unique_deduplicates() {
        let mut list = PostingList::default();
        assert!(list.push_unique("A", 3));
        assert!(!list.push_unique("A", 9));
        assert!(list.push_unique("B", 1));
        assert_eq!(list.df, 2);
        assert_eq!(list.docs[0].tf, 3);
    }
}
