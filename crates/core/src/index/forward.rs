//! Forward index: one record per document with its lemma-ID sequences.
//!
//! Text format, one line per document:
//!
//! ```text
//! doc_id|total_terms|title_lemmas|abstract_lemmas|body_lemmas
//! ```
//!
//! where each lemma section is a comma-separated list of IDs and the body is
//! truncated to [`BODY_TERM_LIMIT`] terms. The forward index doubles as the
//! source of corpus statistics for BM25: document count and per-document
//! lengths are derived from it at load time, never hardcoded.

use crate::config::BODY_TERM_LIMIT;
use crate::lexicon::LemmaId;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;

/// A single forward-index record.
#[derive(Debug, Clone, PartialEq)]
pub struct ForwardRecord {
    pub doc_id: String,
    /// Total lemma count across all sections, before body truncation.
    pub total_terms: u32,
    pub title_lemmas: Vec<LemmaId>,
    pub abstract_lemmas: Vec<LemmaId>,
    pub body_lemmas: Vec<LemmaId>,
}

impl ForwardRecord {
    /// Build a record from section lemma sequences, applying the body limit.
    pub fn new(
        doc_id: String,
        title_lemmas: Vec<LemmaId>,
        abstract_lemmas: Vec<LemmaId>,
        mut body_lemmas: Vec<LemmaId>,
    ) -> Self {
        let total_terms =
            (title_lemmas.len() + abstract_lemmas.len() + body_lemmas.len()) as u32;
        body_lemmas.truncate(BODY_TERM_LIMIT);
        Self {
            doc_id,
            total_terms,
            title_lemmas,
            abstract_lemmas,
            body_lemmas,
        }
    }

    /// All lemmas of the record in section order (body already truncated).
    pub fn all_lemmas(&self) -> impl Iterator<Item = LemmaId> + '_ {
        self.title_lemmas
            .iter()
            .chain(&self.abstract_lemmas)
            .chain(&self.body_lemmas)
            .copied()
    }

    /// Serialize to the pipe-delimited line format (no trailing newline).
    pub fn to_line(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}",
            self.doc_id,
            self.total_terms,
            join_ids(&self.title_lemmas),
            join_ids(&self.abstract_lemmas),
            join_ids(&self.body_lemmas),
        )
    }

    /// Parse a line. Returns `None` for structurally malformed lines; the
    /// caller decides whether that is a warning or an error.
    pub fn from_line(line: &str) -> Option<Self> {
        let mut parts = line.splitn(5, '|');
        let doc_id = parts.next()?.to_string();
        if doc_id.is_empty() {
            return None;
        }
        let total_terms: u32 = parts.next()?.parse().ok()?;
        let title_lemmas = parse_ids(parts.next()?);
        let abstract_lemmas = parse_ids(parts.next()?);
        let body_lemmas = parse_ids(parts.next()?);
        Some(Self {
            doc_id,
            total_terms,
            title_lemmas,
            abstract_lemmas,
            body_lemmas,
        })
    }
}

fn join_ids(ids: &[LemmaId]) -> String {
    let mut out = String::new();
    for (i, id) in ids.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&id.to_string());
    }
    out
}

fn parse_ids(section: &str) -> Vec<LemmaId> {
    section
        .split(',')
        .filter(|t| !t.is_empty())
        .filter_map(|t| t.parse().ok())
        .collect()
}

/// Stream every parseable record of a forward index file through `f`.
/// Malformed lines are skipped with a warning.
pub fn scan(path: &Path, mut f: impl FnMut(ForwardRecord)) -> io::Result<()> {
    let reader = BufReader::new(File::open(path)?);
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        match ForwardRecord::from_line(&line) {
            Some(record) => f(record),
            None => {
                tracing::warn!(line = line_no + 1, "skipping malformed forward index line");
            }
        }
    }
    Ok(())
}

/// Write a whole forward index file.
pub fn write_all(path: &Path, records: &[ForwardRecord]) -> io::Result<()> {
    let mut out = String::new();
    for record in records {
        out.push_str(&record.to_line());
        out.push('\n');
    }
    crate::lexicon::atomic_write(path, out.as_bytes())
}

/// Append one record to an existing forward index (used by the incremental
/// indexer). Creates the file if absent.
pub fn append_record(path: &Path, record: &ForwardRecord) -> io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", record.to_line())?;
    file.sync_all()
}

/// Corpus-level statistics needed by BM25: document count and per-document
/// lengths (total terms). Derived from the forward index.
#[derive(Debug, Default)]
pub struct CorpusStats {
    pub doc_count: u64,
    pub total_terms: u64,
    doc_lengths: HashMap<String, u32>,
}

impl CorpusStats {
    /// Build statistics with a single pass over the forward index.
    pub fn from_forward_index(path: &Path) -> io::Result<Self> {
        let mut stats = Self::default();
        scan(path, |record| {
            stats.observe(record.doc_id, record.total_terms);
        })?;
        Ok(stats)
    }

    /// Record one document. Re-observing a doc ID replaces its length.
    pub fn observe(&mut self, doc_id: String, length: u32) {
        if let Some(old) = self.doc_lengths.insert(doc_id, length) {
            self.total_terms -= u64::from(old);
        } else {
            self.doc_count += 1;
        }
        self.total_terms += u64::from(length);
    }

    pub fn contains(&self, doc_id: &str) -> bool {
        self.doc_lengths.contains_key(doc_id)
    }

    /// Length of a document; falls back to the average for unknown IDs so
    /// BM25 degrades gracefully rather than skewing.
    pub fn doc_length(&self, doc_id: &str) -> f64 {
        self.doc_lengths
            .get(doc_id)
            .map(|&l| f64::from(l))
            .unwrap_or_else(|| self.avg_doc_length())
    }

    pub fn avg_doc_length(&self) -> f64 {
        if self.doc_count == 0 {
            return 0.0;
        }
        self.total_terms as f64 / self.doc_count as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_round_trip() {
        let record = ForwardRecord::new(
            "PMC123".into(),
            vec![1, 2],
            vec![3],
            vec![4, 5, 6],
        );
        let parsed = ForwardRecord::from_line(&record.to_line()).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_empty_sections_round_trip() {
        let record = ForwardRecord::new("PMC9".into(), vec![], vec![], vec![7]);
        let parsed = ForwardRecord::from_line(&record.to_line()).unwrap();
        assert_eq!(parsed.title_lemmas, Vec::<LemmaId>::new());
        assert_eq!(parsed.body_lemmas, vec![7]);
        assert_eq!(parsed.total_terms, 1);
    }

    #[test]
    fn test_body_truncated_but_total_preserved() {
        let body: Vec<LemmaId> = (0..(BODY_TERM_LIMIT as i32 + 100)).collect();
        let record = ForwardRecord::new("PMC1".into(), vec![], vec![], body);
        assert_eq!(record.body_lemmas.len(), BODY_TERM_LIMIT);
        assert_eq!(record.total_terms, BODY_TERM_LIMIT as u32 + 100);
    }

    #[test]
    fn test_malformed_line_rejected() {
        assert!(ForwardRecord::from_line("PMC1|notanumber|1|2|3").is_none());
        assert!(ForwardRecord::from_line("|5|1|2|3").is_none());
        assert!(ForwardRecord::from_line("PMC1|5").is_none());
    }

    #[test]
    fn test_scan_skips_bad_lines() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("forward_index.txt");
        std::fs::write(&path, "PMC1|2|1,2||\ngarbage line\nPMC2|1||3|\n").unwrap();

        let mut seen = Vec::new();
        scan(&path, |r| seen.push(r.doc_id)).unwrap();
        assert_eq!(seen, vec!["PMC1", "PMC2"]);
    }

    #[test]
    fn test_corpus_stats() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("forward_index.txt");
        let records = vec![
            ForwardRecord::new("A".into(), vec![1], vec![], vec![2, 3]),
            ForwardRecord::new("B".into(), vec![], vec![], vec![4]),
        ];
        write_all(&path, &records).unwrap();

        let stats = CorpusStats::from_forward_index(&path).unwrap();
        assert_eq!(stats.doc_count, 2);
        assert_eq!(stats.avg_doc_length(), 2.0);
        assert_eq!(stats.doc_length("A"), 3.0);
        // Unknown docs fall back to the average.
        assert_eq!(stats.doc_length("ZZZ"), 2.0);
    }

    #[test]
    fn test_append_record() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("forward_index.txt");
        write_all(
            &path,
            &[ForwardRecord::new("A".into(), vec![1], vec![], vec![])],
        )
        .unwrap();
        append_record(
            &path,
            &ForwardRecord::new("B".into(), vec![], vec![], vec![2]),
        )
        .unwrap();

        let stats = CorpusStats::from_forward_index(&path).unwrap();
        assert_eq!(stats.doc_count, 2);
    }
}
