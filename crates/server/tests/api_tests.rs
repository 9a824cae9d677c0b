//! Integration tests for the REST API: spawn the router on an ephemeral
//! port and exercise it over HTTP.

use papyrus_core::analysis::{index_tokens, lemma_of};
use papyrus_core::autocomplete::AutocompleteStore;
use papyrus_core::barrel::convert_all_barrels;
use papyrus_core::index::forward::{self, ForwardRecord};
use papyrus_core::index::inverted::InvertedIndex;
use papyrus_core::index::partition::build_barrels;
use papyrus_core::lexicon::Lexicon;
use papyrus_core::{SearchEngine, Settings};
use papyrus_server::api::create_router;
use papyrus_server::api::handlers::AppState;
use std::sync::Arc;
use tempfile::TempDir;

/// Build a small complete index and serve it on an ephemeral port.
/// Returns the base URL and the TempDir keeping the index alive.
async fn spawn_app(docs: &[(&str, &str)]) -> (String, TempDir) {
    let tmp = TempDir::new().expect("temp dir");
    let settings = Settings {
        data_dir: tmp.path().join("data"),
        indexes_dir: tmp.path().join("indexes"),
        lexicon_file: "lexicon.json".into(),
        forward_index_file: "forward_index.txt".into(),
        inverted_index_file: "inverted_index.txt".into(),
        barrels_dir: "barrels".into(),
        barrel_lookup: "barrel_lookup.json".into(),
        json_data: "pmc_json".into(),
    };
    std::fs::create_dir_all(&settings.indexes_dir).unwrap();
    std::fs::create_dir_all(settings.embeddings_dir()).unwrap();

    let mut lexicon = Lexicon::new();
    let mut records = Vec::new();
    for (doc_id, body) in docs {
        let lemmas: Vec<_> = index_tokens(body)
            .iter()
            .map(|w| lexicon.extend(w, &lemma_of(w)).1)
            .collect();
        records.push(ForwardRecord::new(doc_id.to_string(), vec![], vec![], lemmas));
    }
    lexicon.save_json(&settings.lexicon_path()).unwrap();
    forward::write_all(&settings.forward_index_path(), &records).unwrap();

    let inverted = InvertedIndex::build_from_forward(&settings.forward_index_path()).unwrap();
    inverted.save(&settings.inverted_index_path()).unwrap();
    build_barrels(&settings).unwrap();
    convert_all_barrels(&settings).unwrap();

    let mut autocomplete = AutocompleteStore::new();
    for (word, lemma) in lexicon.words() {
        let df = inverted
            .postings
            .get(&lemma)
            .map(|p| p.len() as u32)
            .unwrap_or(1);
        autocomplete.insert_word(word, df);
    }
    autocomplete.save_words(&settings.autocomplete_path()).unwrap();

    let engine = SearchEngine::open(settings).expect("engine opens");
    let state = AppState {
        engine: Arc::new(engine),
    };
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), tmp)
}

fn toy_corpus() -> Vec<(&'static str, &'static str)> {
    vec![
        ("PMC1", "covid vaccine trial results published"),
        ("PMC2", "covid spread patterns worldwide study"),
        ("PMC3", "vaccine storage temperature logistics report"),
    ]
}

#[tokio::test]
async fn test_health_reports_document_count() {
    let (base, _tmp) = spawn_app(&toy_corpus()).await;
    let body: serde_json::Value = reqwest::get(format!("{}/health", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["status"], "ok");
    assert_eq!(body["documents"], 3);
    assert_eq!(body["features"]["semantic_search"], false);
    assert_eq!(body["features"]["autocomplete"], true);
}

#[tokio::test]
async fn test_search_and_mode_returns_ranked_results() {
    let (base, _tmp) = spawn_app(&toy_corpus()).await;
    let body: serde_json::Value = reqwest::get(format!(
        "{}/search?q=covid%20vaccine&mode=and&semantic=false",
        base
    ))
    .await
    .unwrap()
    .json()
    .await
    .unwrap();

    assert_eq!(body["success"], true);
    assert_eq!(body["result_count"], 1);
    let first = &body["results"][0];
    assert_eq!(first["rank"], 1);
    assert_eq!(first["doc_id"], "PMC1");
    assert_eq!(first["matched_terms"], 2);
    assert_eq!(first["total_terms"], 2);
    assert!(first["score"].as_f64().unwrap() > 0.0);
    assert!(first["tfidf_score"].as_f64().unwrap() > 0.0);
    assert!((first["pagerank_score"].as_f64().unwrap() - 0.5).abs() < 1e-6);
}

#[tokio::test]
async fn test_search_or_mode_is_superset_of_and() {
    let (base, _tmp) = spawn_app(&toy_corpus()).await;
    let or_body: serde_json::Value = reqwest::get(format!(
        "{}/search?q=covid%20vaccine&mode=or&semantic=false",
        base
    ))
    .await
    .unwrap()
    .json()
    .await
    .unwrap();

    assert_eq!(or_body["result_count"], 3);
    assert_eq!(or_body["results"][0]["doc_id"], "PMC1");
}

#[tokio::test]
async fn test_search_rejects_bad_mode_and_empty_query() {
    let (base, _tmp) = spawn_app(&toy_corpus()).await;

    let bad_mode = reqwest::get(format!("{}/search?q=covid&mode=xor", base))
        .await
        .unwrap();
    assert_eq!(bad_mode.status(), 400);

    let empty = reqwest::get(format!("{}/search?q=%20", base)).await.unwrap();
    assert_eq!(empty.status(), 400);
}

#[tokio::test]
async fn test_autocomplete_shape() {
    let (base, _tmp) = spawn_app(&toy_corpus()).await;
    let body: serde_json::Value = reqwest::get(format!("{}/autocomplete?prefix=cov", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["success"], true);
    assert_eq!(body["suggestions"][0]["word"], "covid");
    assert_eq!(body["suggestions"][0]["df"], 2);
}

#[tokio::test]
async fn test_similar_degrades_without_embeddings() {
    let (base, _tmp) = spawn_app(&toy_corpus()).await;
    let body: serde_json::Value = reqwest::get(format!("{}/similar?word=covid", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["success"], true);
    assert_eq!(body["similar_words"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_upload_then_search_round_trip() {
    let (base, _tmp) = spawn_app(&toy_corpus()).await;
    let client = reqwest::Client::new();

    let upload: serde_json::Value = client
        .post(format!("{}/documents", base))
        .json(&serde_json::json!({
            "title": "Novel zxzz findings",
            "abstract": "First description of zxzz",
            "body": "zxzz behaves unexpectedly under pressure"
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(upload["success"], true);
    assert!(upload["new_terms_added"].as_u64().unwrap() > 0);
    let doc_id = upload["doc_id"].as_str().unwrap().to_string();

    let search: serde_json::Value = reqwest::get(format!(
        "{}/search?q=zxzz&mode=and&semantic=false",
        base
    ))
    .await
    .unwrap()
    .json()
    .await
    .unwrap();

    assert_eq!(search["result_count"], 1);
    assert_eq!(search["results"][0]["doc_id"], doc_id);
    assert_eq!(search["results"][0]["title"], "Novel zxzz findings");
}

#[tokio::test]
async fn test_upload_duplicate_id_conflicts() {
    let (base, _tmp) = spawn_app(&toy_corpus()).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/documents", base))
        .json(&serde_json::json!({
            "doc_id": "PMC1",
            "title": "Duplicate",
            "body": "duplicate content here"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 409);
}
