//! Request and response data transfer objects for the REST API.
//!
//! All types derive `Serialize` and/or `Deserialize` for JSON marshalling
//! via Axum. Field names follow the historical wire format: the BM25
//! component is still called `tfidf_score` and the authority prior
//! `pagerank_score`.

use serde::{Deserialize, Serialize};

/// Query string for `GET /search`.
#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default = "default_mode")]
    pub mode: String,
    #[serde(default = "default_semantic")]
    pub semantic: bool,
}

fn default_mode() -> String {
    "and".to_string()
}

fn default_semantic() -> bool {
    true
}

/// One ranked result in a search response.
#[derive(Debug, Serialize)]
pub struct SearchResultDto {
    pub rank: usize,
    pub doc_id: String,
    pub score: f64,
    pub tfidf_score: f64,
    pub semantic_score: f64,
    pub pagerank_score: f64,
    pub matched_terms: u32,
    pub total_terms: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// A query term after expansion, with its ranking weight.
#[derive(Debug, Serialize)]
pub struct ExpandedTermDto {
    pub word: String,
    pub lemma_id: i32,
    pub weight: f64,
}

/// Response body for `GET /search`.
#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub success: bool,
    pub query: String,
    pub mode: String,
    pub semantic: bool,
    pub expanded_terms: Vec<ExpandedTermDto>,
    pub search_time_ms: u64,
    pub result_count: usize,
    pub results: Vec<SearchResultDto>,
}

/// Query string for `GET /autocomplete`.
#[derive(Debug, Deserialize)]
pub struct AutocompleteParams {
    pub prefix: String,
}

#[derive(Debug, Serialize)]
pub struct SuggestionDto {
    pub word: String,
    pub df: u32,
}

/// Response body for `GET /autocomplete`.
#[derive(Debug, Serialize)]
pub struct AutocompleteResponse {
    pub success: bool,
    pub prefix: String,
    pub suggestions: Vec<SuggestionDto>,
    pub time_ms: u64,
}

/// Query string for `GET /similar`.
#[derive(Debug, Deserialize)]
pub struct SimilarParams {
    pub word: String,
}

#[derive(Debug, Serialize)]
pub struct SimilarWordDto {
    pub word: String,
    pub similarity: f32,
}

/// Response body for `GET /similar`.
#[derive(Debug, Serialize)]
pub struct SimilarResponse {
    pub success: bool,
    pub word: String,
    pub similar_words: Vec<SimilarWordDto>,
    pub time_ms: u64,
}

/// Request body for `POST /documents`.
#[derive(Debug, Deserialize)]
pub struct UploadRequest {
    pub doc_id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "abstract", default)]
    pub abstract_text: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub authors: Vec<String>,
}

/// Response body for `POST /documents`.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub doc_id: String,
    pub indexing_time_ms: u64,
    pub total_terms: u32,
    pub unique_terms: u32,
    pub new_terms_added: u32,
}

/// Response body for `GET /health`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub documents: u64,
    pub features: HealthFeatures,
}

#[derive(Debug, Serialize)]
pub struct HealthFeatures {
    pub semantic_search: bool,
    pub autocomplete: bool,
}
