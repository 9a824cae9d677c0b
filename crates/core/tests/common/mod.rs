//! Shared fixture: builds a complete on-disk index from a toy corpus by
//! running the real build pipeline (lexicon → forward → inverted → barrels
//! → binary barrels → autocomplete buckets).

// Not every integration test uses every helper.
#![allow(dead_code)]

use papyrus_core::analysis::{index_tokens, lemma_of};
use papyrus_core::autocomplete::AutocompleteStore;
use papyrus_core::barrel::convert_all_barrels;
use papyrus_core::index::forward::{self, ForwardRecord};
use papyrus_core::index::inverted::InvertedIndex;
use papyrus_core::index::partition::build_barrels;
use papyrus_core::lexicon::{LemmaId, Lexicon};
use papyrus_core::{SearchEngine, Settings};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

pub struct TestDoc {
    pub id: &'static str,
    pub title: &'static str,
    pub abstract_text: &'static str,
    pub body: &'static str,
}

pub struct TestIndex {
    // Held for its Drop: removes the index directory with it.
    #[allow(dead_code)]
    pub tmp: TempDir,
    pub settings: Settings,
}

pub fn settings_in(dir: &Path) -> Settings {
    Settings {
        data_dir: dir.join("data"),
        indexes_dir: dir.join("indexes"),
        lexicon_file: "lexicon.json".into(),
        forward_index_file: "forward_index.txt".into(),
        inverted_index_file: "inverted_index.txt".into(),
        barrels_dir: "barrels".into(),
        barrel_lookup: "barrel_lookup.json".into(),
        json_data: "pmc_json".into(),
    }
}

/// Run the whole build pipeline over `docs`.
pub fn build_index(docs: &[TestDoc]) -> TestIndex {
    let tmp = TempDir::new().expect("temp dir");
    let settings = settings_in(tmp.path());
    fs::create_dir_all(&settings.indexes_dir).unwrap();
    fs::create_dir_all(settings.embeddings_dir()).unwrap();

    let mut lexicon = Lexicon::new();
    let mut records = Vec::new();
    for doc in docs {
        let title = resolve(&mut lexicon, doc.title);
        let abstract_lemmas = resolve(&mut lexicon, doc.abstract_text);
        let body = resolve(&mut lexicon, doc.body);
        records.push(ForwardRecord::new(
            doc.id.to_string(),
            title,
            abstract_lemmas,
            body,
        ));
    }
    lexicon.save_json(&settings.lexicon_path()).unwrap();
    lexicon.save_binary(&settings.binary_lexicon_path()).unwrap();

    forward::write_all(&settings.forward_index_path(), &records).unwrap();

    let inverted = InvertedIndex::build_from_forward(&settings.forward_index_path()).unwrap();
    inverted.save(&settings.inverted_index_path()).unwrap();

    build_barrels(&settings).unwrap();
    convert_all_barrels(&settings).unwrap();

    // Word buckets carry each word's lemma df, like the offline builder.
    let df_by_lemma: HashMap<LemmaId, u32> = inverted
        .postings
        .iter()
        .map(|(&lemma, postings)| (lemma, postings.len() as u32))
        .collect();
    let mut autocomplete = AutocompleteStore::new();
    for (word, lemma) in lexicon.words() {
        autocomplete.insert_word(word, df_by_lemma.get(&lemma).copied().unwrap_or(1));
    }
    autocomplete.save_words(&settings.autocomplete_path()).unwrap();
    autocomplete
        .save_ngrams(&settings.ngram_autocomplete_path())
        .unwrap();

    TestIndex { tmp, settings }
}

fn resolve(lexicon: &mut Lexicon, text: &str) -> Vec<LemmaId> {
    index_tokens(text)
        .iter()
        .map(|word| lexicon.extend(word, &lemma_of(word)).1)
        .collect::<Vec<_>>()
}

/// Write an embeddings file + vocab into the index layout.
pub fn add_embeddings(index: &TestIndex, entries: &[(&str, Vec<f32>)]) {
    let owned: Vec<(String, Vec<f32>)> = entries
        .iter()
        .map(|(w, v)| (w.to_string(), v.clone()))
        .collect();
    papyrus_core::embeddings::write_embeddings(
        &index.settings.embeddings_bin_path(),
        &index.settings.vocab_path(),
        &owned,
        papyrus_core::config::EMBEDDING_DIM,
    )
    .unwrap();
}

/// Write an authority score table into the index layout.
pub fn add_doc_scores(index: &TestIndex, scores: &[(&str, f32)]) {
    let map: HashMap<&str, f32> = scores.iter().copied().collect();
    fs::write(
        index.settings.doc_scores_path(),
        serde_json::to_vec(&map).unwrap(),
    )
    .unwrap();
}

pub fn open(index: &TestIndex) -> SearchEngine {
    SearchEngine::open(index.settings.clone()).expect("engine opens")
}

/// A 50-dim vector with the given leading components, rest zero.
pub fn vec50(components: &[f32]) -> Vec<f32> {
    let mut v = vec![0.0f32; papyrus_core::config::EMBEDDING_DIM];
    v[..components.len()].copy_from_slice(components);
    v
}
