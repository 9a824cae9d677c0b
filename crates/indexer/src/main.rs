//! Offline build pipeline: documents → lexicon → forward index → inverted
//! index → barrels → binary barrels, plus the autocomplete buckets, n-gram
//! index, binary lexicon, and document authority scores.
//!
//! Each stage is a subcommand so a partial rebuild is cheap; `all` runs the
//! full chain. Exit code 0 on success, 1 on any fatal IO/parse error with a
//! message on stderr.

mod corpus;

use clap::{Parser, Subcommand};
use papyrus_core::analysis::{index_tokens, lemma_of};
use papyrus_core::autocomplete::AutocompleteStore;
use papyrus_core::barrel::convert_all_barrels;
use papyrus_core::config::{NGRAM_MAX_PHRASES, NGRAM_MIN_FREQ};
use papyrus_core::index::forward::{self, ForwardRecord};
use papyrus_core::index::inverted::{self, InvertedIndex};
use papyrus_core::index::partition::build_barrels;
use papyrus_core::lexicon::{LemmaId, Lexicon};
use papyrus_core::Settings;
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "papyrus-indexer", about = "Search index build pipeline")]
struct Args {
    /// Path to config.json
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    #[command(subcommand)]
    stage: Stage,
}

#[derive(Subcommand)]
enum Stage {
    /// Build the lexicon from the raw corpus
    Lexicon,
    /// Build the forward index (requires the lexicon)
    Forward,
    /// Build the textual inverted index (requires the forward index)
    Inverted,
    /// Partition the inverted index into textual barrels + lookup table
    Barrels,
    /// Convert textual barrels into binary pairs
    BinaryBarrels,
    /// Build autocomplete buckets, the binary lexicon, and authority scores
    Autocomplete,
    /// Build the multi-word n-gram autocomplete index
    Ngrams,
    /// Run every stage in order
    All,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(
                "papyrus_indexer=info"
                    .parse()
                    .expect("valid directive literal"),
            ),
        )
        .init();

    let args = Args::parse();
    let settings = match Settings::load(&args.config) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: cannot load config {}: {}", args.config.display(), e);
            std::process::exit(1);
        }
    };

    let started = Instant::now();
    let result = match args.stage {
        Stage::Lexicon => build_lexicon(&settings),
        Stage::Forward => build_forward(&settings),
        Stage::Inverted => build_inverted(&settings),
        Stage::Barrels => build_barrels(&settings).map(|_| ()),
        Stage::BinaryBarrels => convert_all_barrels(&settings).map(|_| ()),
        Stage::Autocomplete => build_autocomplete(&settings),
        Stage::Ngrams => build_ngrams(&settings),
        Stage::All => run_all(&settings),
    };

    match result {
        Ok(()) => {
            tracing::info!(elapsed_s = started.elapsed().as_secs(), "done");
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

fn run_all(settings: &Settings) -> io::Result<()> {
    build_lexicon(settings)?;
    build_forward(settings)?;
    build_inverted(settings)?;
    build_barrels(settings)?;
    convert_all_barrels(settings)?;
    build_autocomplete(settings)?;
    build_ngrams(settings)
}

/// Scan the corpus and assign word and lemma IDs in document order.
fn build_lexicon(settings: &Settings) -> io::Result<()> {
    let corpus_dir = settings.find_corpus_dir()?;
    std::fs::create_dir_all(&settings.indexes_dir)?;

    let mut lexicon = Lexicon::new();
    let mut parsed = 0usize;
    for path in corpus::corpus_files(&corpus_dir) {
        let doc = match corpus::parse_document(&path) {
            Ok(doc) => doc,
            Err(e) => {
                tracing::warn!("skipping {}: {}", path.display(), e);
                continue;
            }
        };
        for text in [&doc.title, &doc.abstract_text, &doc.body] {
            for word in index_tokens(text).iter() {
                lexicon.extend(word, &lemma_of(word));
            }
        }
        parsed += 1;
    }

    lexicon.save_json(&settings.lexicon_path())?;
    tracing::info!(
        documents = parsed,
        words = lexicon.word_count(),
        "lexicon built"
    );
    Ok(())
}

/// Emit one forward-index record per document. Unknown words are dropped;
/// documents with zero terms are omitted.
fn build_forward(settings: &Settings) -> io::Result<()> {
    let corpus_dir = settings.find_corpus_dir()?;
    let lexicon = Lexicon::load_json(&settings.lexicon_path())?;

    let resolve = |text: &str| -> Vec<LemmaId> {
        index_tokens(text)
            .iter()
            .filter_map(|word| lexicon.lemma_for_word(word))
            .collect()
    };

    let mut records = Vec::new();
    let mut skipped = 0usize;
    for path in corpus::corpus_files(&corpus_dir) {
        let doc = match corpus::parse_document(&path) {
            Ok(doc) => doc,
            Err(e) => {
                tracing::warn!("skipping {}: {}", path.display(), e);
                skipped += 1;
                continue;
            }
        };
        let record = ForwardRecord::new(
            doc.doc_id,
            resolve(&doc.title),
            resolve(&doc.abstract_text),
            resolve(&doc.body),
        );
        if record.total_terms == 0 {
            skipped += 1;
            continue;
        }
        records.push(record);
    }

    forward::write_all(&settings.forward_index_path(), &records)?;
    tracing::info!(documents = records.len(), skipped, "forward index built");
    Ok(())
}

fn build_inverted(settings: &Settings) -> io::Result<()> {
    let index = InvertedIndex::build_from_forward(&settings.forward_index_path())?;
    index.save(&settings.inverted_index_path())?;
    tracing::info!(
        terms = index.term_count(),
        documents = index.doc_count,
        "inverted index built"
    );
    Ok(())
}

/// Word prefix buckets (df-ranked), the binary lexicon, and per-document
/// authority scores derived from forward-index statistics.
fn build_autocomplete(settings: &Settings) -> io::Result<()> {
    let lexicon = Lexicon::load_json(&settings.lexicon_path())?;
    std::fs::create_dir_all(settings.embeddings_dir())?;
    lexicon.save_binary(&settings.binary_lexicon_path())?;

    let mut lemma_df: HashMap<LemmaId, u32> = HashMap::new();
    inverted::scan(&settings.inverted_index_path(), |lemma, df, _| {
        lemma_df.insert(lemma, df.max(0) as u32);
    })?;

    let mut store = AutocompleteStore::new();
    for (word, lemma) in lexicon.words() {
        store.insert_word(word, lemma_df.get(&lemma).copied().unwrap_or(1));
    }
    store.save_words(&settings.autocomplete_path())?;

    let scores = compute_doc_scores(settings)?;
    let bytes = serde_json::to_vec(&scores).map_err(io::Error::other)?;
    std::fs::write(settings.doc_scores_path(), bytes)?;

    tracing::info!(
        word_prefixes = store.word_prefix_count(),
        scored_docs = scores.len(),
        "autocomplete buckets and authority scores built"
    );
    Ok(())
}

/// Authority prior per document, blending vocabulary diversity, section
/// completeness, and length normalization into [0, 1].
fn compute_doc_scores(settings: &Settings) -> io::Result<HashMap<String, f32>> {
    struct DocShape {
        total: u32,
        unique: u32,
        has_title: bool,
        has_abstract: bool,
    }

    let mut shapes: HashMap<String, DocShape> = HashMap::new();
    let mut total_sum: u64 = 0;
    forward::scan(&settings.forward_index_path(), |record| {
        let mut unique: Vec<LemmaId> = record.all_lemmas().collect();
        unique.sort_unstable();
        unique.dedup();
        total_sum += u64::from(record.total_terms);
        shapes.insert(
            record.doc_id.clone(),
            DocShape {
                total: record.total_terms,
                unique: unique.len() as u32,
                has_title: !record.title_lemmas.is_empty(),
                has_abstract: !record.abstract_lemmas.is_empty(),
            },
        );
    })?;

    if shapes.is_empty() {
        return Ok(HashMap::new());
    }
    let avg_len = total_sum as f32 / shapes.len() as f32;

    let mut scores = HashMap::with_capacity(shapes.len());
    for (doc_id, shape) in shapes {
        if shape.total == 0 {
            scores.insert(doc_id, 0.1);
            continue;
        }
        let diversity = (shape.unique as f32 / shape.total as f32).min(1.0);
        let mut completeness = 0.5;
        if shape.has_title {
            completeness += 0.25;
        }
        if shape.has_abstract {
            completeness += 0.25;
        }
        let length_norm =
            (1.0 / (1.0 + 0.5 * (shape.total as f32 / avg_len - 1.0))).clamp(0.5, 1.5);
        let score = 0.4 * diversity + 0.3 * completeness + 0.3 * length_norm;
        scores.insert(doc_id, score.clamp(0.0, 1.0));
    }
    Ok(scores)
}

/// Count corpus bigrams and trigrams, filter rare ones, and build the
/// multi-word prefix buckets.
fn build_ngrams(settings: &Settings) -> io::Result<()> {
    let corpus_dir = settings.find_corpus_dir()?;

    let mut bigrams: HashMap<String, u32> = HashMap::new();
    let mut trigrams: HashMap<String, u32> = HashMap::new();
    for path in corpus::corpus_files(&corpus_dir) {
        let doc = match corpus::parse_document(&path) {
            Ok(doc) => doc,
            Err(_) => continue,
        };
        // Phrases come from running text only; titles are too terse.
        for text in [&doc.abstract_text, &doc.body] {
            let words: Vec<String> = index_tokens(text).iter().map(String::from).collect();
            for pair in words.windows(2) {
                *bigrams.entry(format!("{} {}", pair[0], pair[1])).or_insert(0) += 1;
            }
            for triple in words.windows(3) {
                *trigrams
                    .entry(format!("{} {} {}", triple[0], triple[1], triple[2]))
                    .or_insert(0) += 1;
            }
        }
    }

    let mut store = AutocompleteStore::new();
    let mut kept = 0usize;
    for counts in [bigrams, trigrams] {
        let mut phrases: Vec<(String, u32)> = counts
            .into_iter()
            .filter(|&(_, count)| count >= NGRAM_MIN_FREQ)
            .collect();
        phrases.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        phrases.truncate(NGRAM_MAX_PHRASES);
        kept += phrases.len();
        for (phrase, count) in phrases {
            store.insert_phrase(&phrase, count);
        }
    }

    store.save_ngrams(&settings.ngram_autocomplete_path())?;
    tracing::info!(phrases = kept, "n-gram autocomplete index built");
    Ok(())
}
