//! The query engine: orchestrates tokenize → lemma lookup → semantic
//! expansion → posting retrieval → BM25 scoring → AND/OR merge → top-K.
//!
//! A [`SearchEngine`] owns every loaded store. The read path is lock-light:
//! primary barrels and embeddings are immutable after load, while the
//! lexicon, autocomplete buckets, metadata, corpus statistics, and the delta
//! barrel snapshot sit behind `parking_lot::RwLock`s that only the single
//! incremental writer ever takes for writing.
//!
//! Scoring is Okapi BM25; the historical API field name `tfidf_score` is
//! preserved at the facade for compatibility, but the computation is BM25.

use crate::analysis;
use crate::autocomplete::AutocompleteStore;
use crate::barrel::BarrelIndex;
use crate::config;
use crate::embeddings::EmbeddingStore;
use crate::index::forward::CorpusStats;
use crate::lexicon::{Lexicon, LemmaId};
use crate::metadata::MetadataStore;
use crate::settings::Settings;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::time::{Duration, Instant};

/// AND/OR merge mode for multi-word queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    And,
    Or,
}

impl std::str::FromStr for QueryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "and" => Ok(QueryMode::And),
            "or" => Ok(QueryMode::Or),
            other => Err(format!("unknown query mode '{}'", other)),
        }
    }
}

/// Ranking parameters, defaulting to the engine constants.
#[derive(Debug, Clone)]
pub struct EngineTuning {
    pub k1: f64,
    pub b: f64,
    pub top_k: usize,
    pub tfidf_weight: f64,
    pub semantic_weight: f64,
    pub authority_weight: f64,
    pub similarity_threshold: f32,
    pub expansion_weight: f64,
    pub top_similar: usize,
}

impl Default for EngineTuning {
    fn default() -> Self {
        Self {
            k1: config::BM25_K1,
            b: config::BM25_B,
            top_k: config::TOP_K,
            tfidf_weight: config::TFIDF_WEIGHT,
            semantic_weight: config::SEMANTIC_WEIGHT,
            authority_weight: config::AUTHORITY_WEIGHT,
            similarity_threshold: config::SIMILARITY_THRESHOLD,
            expansion_weight: config::EXPANSION_WEIGHT,
            top_similar: config::TOP_SIMILAR_WORDS,
        }
    }
}

/// Error surface of the query path.
#[derive(Debug)]
pub enum SearchError {
    /// The soft deadline expired; partial state was discarded.
    Timeout,
}

impl fmt::Display for SearchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchError::Timeout => write!(f, "query deadline exceeded"),
        }
    }
}

impl std::error::Error for SearchError {}

/// A query term after expansion: original terms carry weight 1.0, semantic
/// expansions carry `similarity × expansion_weight`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpandedTerm {
    pub word: String,
    pub lemma_id: LemmaId,
    pub weight: f64,
}

/// One ranked search result.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub doc_id: String,
    /// Combined score: `0.5·bm25 + 0.3·semantic + 0.2·authority`.
    pub score: f64,
    /// BM25 sum over matched original terms.
    pub tfidf_score: f64,
    /// Weighted BM25 sum over semantic-expansion terms.
    pub semantic_score: f64,
    pub authority_score: f64,
    pub matched_terms: u32,
    pub total_terms: u32,
}

/// The full result of a `search` call.
#[derive(Debug, Default)]
pub struct SearchOutcome {
    pub hits: Vec<SearchHit>,
    pub expanded_terms: Vec<ExpandedTerm>,
    pub elapsed_ms: u64,
}

/// Okapi BM25 per-term score.
///
/// `idf = ln((n − df + 0.5)/(df + 0.5) + 1)`, then the tf saturation with
/// document length normalization against `avg_len`.
pub fn bm25_score(tf: f64, df: f64, n: f64, doc_len: f64, avg_len: f64, k1: f64, b: f64) -> f64 {
    if tf <= 0.0 || df <= 0.0 || n <= 0.0 {
        return 0.0;
    }
    let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();
    let length_ratio = if avg_len > 0.0 { doc_len / avg_len } else { 1.0 };
    let tf_norm = (tf * (k1 + 1.0)) / (tf + k1 * (1.0 - b + b * length_ratio));
    idf * tf_norm
}

struct DocAccumulator {
    tfidf: f64,
    semantic: f64,
    authority: f64,
    matched: u32,
}

/// The long-lived engine instance. Load once at process start; queries may
/// run concurrently on independent threads.
pub struct SearchEngine {
    pub(crate) settings: Settings,
    pub(crate) tuning: EngineTuning,
    pub(crate) lexicon: RwLock<Lexicon>,
    pub(crate) barrels: BarrelIndex,
    pub(crate) embeddings: Option<EmbeddingStore>,
    pub(crate) autocomplete: RwLock<AutocompleteStore>,
    pub(crate) metadata: RwLock<MetadataStore>,
    pub(crate) stats: RwLock<CorpusStats>,
    /// Serializes incremental writes: at most one in flight.
    pub(crate) writer: Mutex<()>,
}

impl SearchEngine {
    /// Open the engine with default tuning. See [`Self::open_with_tuning`].
    pub fn open(settings: Settings) -> io::Result<Self> {
        Self::open_with_tuning(settings, EngineTuning::default())
    }

    /// Load every store under the configured layout.
    ///
    /// Required (fatal when missing): the lexicon, the barrel lookup table,
    /// and the forward index (source of corpus statistics). Optional
    /// (degrade with a log line): embeddings, autocomplete buckets, document
    /// scores, metadata, and the delta barrel.
    pub fn open_with_tuning(settings: Settings, tuning: EngineTuning) -> io::Result<Self> {
        let started = Instant::now();

        // The JSON lexicon is authoritative when present: unlike the binary
        // form it carries lemma strings, which incremental extension needs
        // for lemma-ID reuse. Serving-only deployments may ship only the
        // binary file.
        let json_path = settings.lexicon_path();
        let lexicon = if json_path.exists() {
            Lexicon::load_json(&json_path)?
        } else {
            Lexicon::load_binary(&settings.binary_lexicon_path())?
        };

        let barrels = BarrelIndex::open(&settings)?;
        let stats = CorpusStats::from_forward_index(&settings.forward_index_path())?;
        let embeddings =
            EmbeddingStore::load(&settings.embeddings_bin_path(), &settings.vocab_path())?;
        let autocomplete = AutocompleteStore::load(
            &settings.autocomplete_path(),
            &settings.ngram_autocomplete_path(),
        );
        let metadata =
            MetadataStore::load(&settings.document_metadata_path(), &settings.doc_scores_path())?;

        tracing::info!(
            words = lexicon.word_count(),
            docs = stats.doc_count,
            semantic = embeddings.is_some(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "search engine ready"
        );

        Ok(Self {
            settings,
            tuning,
            lexicon: RwLock::new(lexicon),
            barrels,
            embeddings,
            autocomplete: RwLock::new(autocomplete),
            metadata: RwLock::new(metadata),
            stats: RwLock::new(stats),
            writer: Mutex::new(()),
        })
    }

    /// Number of indexed documents.
    pub fn doc_count(&self) -> u64 {
        self.stats.read().doc_count
    }

    /// Whether semantic expansion is available.
    pub fn semantic_enabled(&self) -> bool {
        self.embeddings.is_some()
    }

    /// Whether any autocomplete buckets are loaded.
    pub fn autocomplete_enabled(&self) -> bool {
        !self.autocomplete.read().is_empty()
    }

    /// Title of an indexed document, if metadata is known.
    pub fn doc_title(&self, doc_id: &str) -> Option<String> {
        self.metadata.read().get(doc_id).map(|m| m.title.clone())
    }

    /// Execute a search. `deadline` is a soft cancellation point checked
    /// before every posting-list fetch and before scoring each term; when it
    /// expires the partial result is discarded and [`SearchError::Timeout`]
    /// is returned. Without an explicit deadline the engine applies
    /// [`config::DEFAULT_QUERY_TIMEOUT_SECS`].
    pub fn search(
        &self,
        query: &str,
        mode: QueryMode,
        semantic: bool,
        deadline: Option<Instant>,
    ) -> Result<SearchOutcome, SearchError> {
        let started = Instant::now();
        let deadline = deadline
            .unwrap_or_else(|| started + Duration::from_secs(config::DEFAULT_QUERY_TIMEOUT_SECS));

        let expanded = self.expand_query(query, semantic);
        let original_count = expanded.iter().filter(|t| t.weight >= 1.0).count() as u32;
        if expanded.is_empty() {
            return Ok(SearchOutcome {
                hits: Vec::new(),
                expanded_terms: expanded,
                elapsed_ms: started.elapsed().as_millis() as u64,
            });
        }

        let mut docs: HashMap<String, DocAccumulator> = HashMap::new();
        {
            let stats = self.stats.read();
            let metadata = self.metadata.read();
            let n = stats.doc_count as f64;
            let avg_len = stats.avg_doc_length();

            for term in &expanded {
                check_deadline(deadline)?;
                let list = match self.barrels.fetch(term.lemma_id) {
                    Ok(Some(list)) => list,
                    Ok(None) => continue,
                    Err(e) => {
                        tracing::warn!(
                            word = %term.word,
                            lemma = term.lemma_id,
                            "postings unavailable, continuing without term: {}",
                            e
                        );
                        continue;
                    }
                };

                check_deadline(deadline)?;
                let df = f64::from(list.df);
                for posting in &list.docs {
                    let doc_len = stats.doc_length(&posting.doc_id);
                    let score = bm25_score(
                        f64::from(posting.tf),
                        df,
                        n,
                        doc_len,
                        avg_len,
                        self.tuning.k1,
                        self.tuning.b,
                    ) * term.weight;

                    let acc = docs.entry(posting.doc_id.clone()).or_insert_with(|| {
                        DocAccumulator {
                            tfidf: 0.0,
                            semantic: 0.0,
                            authority: f64::from(metadata.authority(&posting.doc_id)),
                            matched: 0,
                        }
                    });
                    if term.weight >= 1.0 {
                        acc.tfidf += score;
                        acc.matched += 1;
                    } else {
                        acc.semantic += score;
                    }
                }
            }
        }

        let required = match mode {
            QueryMode::And => original_count,
            QueryMode::Or => 1,
        };

        let mut hits: Vec<SearchHit> = docs
            .into_iter()
            .filter(|(_, acc)| acc.matched >= required)
            .map(|(doc_id, acc)| SearchHit {
                doc_id,
                score: self.tuning.tfidf_weight * acc.tfidf
                    + self.tuning.semantic_weight * acc.semantic
                    + self.tuning.authority_weight * acc.authority,
                tfidf_score: acc.tfidf,
                semantic_score: acc.semantic,
                authority_score: acc.authority,
                matched_terms: acc.matched,
                total_terms: original_count,
            })
            .collect();

        hits.sort_unstable_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.matched_terms.cmp(&a.matched_terms))
                .then_with(|| a.doc_id.cmp(&b.doc_id))
        });
        hits.truncate(self.tuning.top_k);

        Ok(SearchOutcome {
            hits,
            expanded_terms: expanded,
            elapsed_ms: started.elapsed().as_millis() as u64,
        })
    }

    /// Tokenize the query and attach semantic expansions.
    ///
    /// Original terms are deduplicated by lemma and carry weight 1.0. With
    /// `semantic`, each original surface word contributes up to
    /// `top_similar` expansion candidates with similarity strictly above the
    /// threshold, weighted `similarity × expansion_weight`, skipping lemmas
    /// already present.
    fn expand_query(&self, query: &str, semantic: bool) -> Vec<ExpandedTerm> {
        let tokens = analysis::tokenize(query);
        let lexicon = self.lexicon.read();

        let mut expanded: Vec<ExpandedTerm> = Vec::new();
        let mut seen: std::collections::HashSet<LemmaId> = std::collections::HashSet::new();

        for token in tokens.iter() {
            match lexicon.lemma_for_word(token) {
                Some(lemma_id) => {
                    if seen.insert(lemma_id) {
                        expanded.push(ExpandedTerm {
                            word: token.to_string(),
                            lemma_id,
                            weight: 1.0,
                        });
                    }
                }
                None => {
                    tracing::warn!(word = token, "query term not in lexicon, skipping");
                }
            }
        }

        if semantic {
            if let Some(embeddings) = &self.embeddings {
                for token in tokens.iter() {
                    for (word, similarity) in
                        embeddings.find_similar(token, self.tuning.top_similar)
                    {
                        if similarity <= self.tuning.similarity_threshold {
                            continue;
                        }
                        let Some(lemma_id) = lexicon.lemma_for_word(&word) else {
                            continue;
                        };
                        if seen.insert(lemma_id) {
                            expanded.push(ExpandedTerm {
                                word,
                                lemma_id,
                                weight: f64::from(similarity) * self.tuning.expansion_weight,
                            });
                        }
                    }
                }
            }
        }

        expanded
    }

    /// Prefix autocomplete, up to [`config::AUTOCOMPLETE_SUGGESTIONS`]
    /// completions in bucket (df-descending) order.
    pub fn autocomplete(&self, prefix: &str) -> Vec<(String, u32)> {
        self.autocomplete
            .read()
            .suggest(prefix, config::AUTOCOMPLETE_SUGGESTIONS)
    }

    /// Words most similar to `word` by embedding cosine, up to
    /// [`config::SIMILAR_WORDS_RESULT_COUNT`]. Empty when embeddings are
    /// unavailable.
    pub fn similar(&self, word: &str) -> Vec<(String, f32)> {
        let word = word.trim().to_lowercase();
        match &self.embeddings {
            Some(embeddings) => {
                embeddings.find_similar(&word, config::SIMILAR_WORDS_RESULT_COUNT)
            }
            None => Vec::new(),
        }
    }
}

fn check_deadline(deadline: Instant) -> Result<(), SearchError> {
    if Instant::now() >= deadline {
        Err(SearchError::Timeout)
    } else {
        Ok(())
    }
}
