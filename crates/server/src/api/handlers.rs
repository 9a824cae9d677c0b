//! HTTP request handlers and shared application state.

use crate::api::errors::ApiError;
use crate::api::models::*;
use axum::extract::{Query, State};
use axum::Json;
use papyrus_core::{DocumentPayload, QueryMode, SearchEngine, SearchError};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Per-request soft deadline fed into the engine's cancellation checks.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared application state passed to every handler via Axum's `State`
/// extractor. The engine is loaded once at startup and shared.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SearchEngine>,
}

/// `GET /search?q=&mode=and|or&semantic=true|false`
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    let query = params.q.trim().to_string();
    if query.is_empty() {
        return Err(ApiError::BadRequest("query must not be empty".into()));
    }
    let mode: QueryMode = params.mode.parse().map_err(ApiError::BadRequest)?;
    let semantic = params.semantic;

    let deadline = Instant::now() + REQUEST_TIMEOUT;
    let engine = state.engine.clone();
    let query_for_engine = query.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        engine.search(&query_for_engine, mode, semantic, Some(deadline))
    })
    .await
    .map_err(|e| ApiError::Internal(format!("search task failed: {}", e)))?
    .map_err(|e| match e {
        SearchError::Timeout => ApiError::Timeout(e.to_string()),
    })?;

    let results: Vec<SearchResultDto> = outcome
        .hits
        .iter()
        .enumerate()
        .map(|(i, hit)| SearchResultDto {
            rank: i + 1,
            doc_id: hit.doc_id.clone(),
            score: hit.score,
            tfidf_score: hit.tfidf_score,
            semantic_score: hit.semantic_score,
            pagerank_score: hit.authority_score,
            matched_terms: hit.matched_terms,
            total_terms: hit.total_terms,
            title: state.engine.doc_title(&hit.doc_id),
        })
        .collect();

    Ok(Json(SearchResponse {
        success: true,
        query,
        mode: params.mode.to_lowercase(),
        semantic,
        expanded_terms: outcome
            .expanded_terms
            .into_iter()
            .map(|t| ExpandedTermDto {
                word: t.word,
                lemma_id: t.lemma_id,
                weight: t.weight,
            })
            .collect(),
        search_time_ms: outcome.elapsed_ms,
        result_count: results.len(),
        results,
    }))
}

/// `GET /autocomplete?prefix=`
pub async fn autocomplete(
    State(state): State<AppState>,
    Query(params): Query<AutocompleteParams>,
) -> Result<Json<AutocompleteResponse>, ApiError> {
    let prefix = params.prefix.trim().to_lowercase();
    if prefix.is_empty() {
        return Err(ApiError::BadRequest("prefix must not be empty".into()));
    }

    let started = Instant::now();
    let suggestions = state
        .engine
        .autocomplete(&prefix)
        .into_iter()
        .map(|(word, df)| SuggestionDto { word, df })
        .collect::<Vec<_>>();

    Ok(Json(AutocompleteResponse {
        success: true,
        prefix,
        suggestions,
        time_ms: started.elapsed().as_millis() as u64,
    }))
}

/// `GET /similar?word=`
pub async fn similar(
    State(state): State<AppState>,
    Query(params): Query<SimilarParams>,
) -> Result<Json<SimilarResponse>, ApiError> {
    let word = params.word.trim().to_lowercase();
    if word.is_empty() {
        return Err(ApiError::BadRequest("word must not be empty".into()));
    }

    let started = Instant::now();
    let similar_words = state
        .engine
        .similar(&word)
        .into_iter()
        .map(|(word, similarity)| SimilarWordDto { word, similarity })
        .collect::<Vec<_>>();

    Ok(Json(SimilarResponse {
        success: true,
        word,
        similar_words,
        time_ms: started.elapsed().as_millis() as u64,
    }))
}

/// `POST /documents`
///
/// Indexing touches disk and can take seconds; it runs on the blocking
/// thread pool. The engine serializes concurrent uploads internally.
pub async fn upload_document(
    State(state): State<AppState>,
    Json(request): Json<UploadRequest>,
) -> Result<Json<UploadResponse>, ApiError> {
    let engine = state.engine.clone();
    let payload = DocumentPayload {
        doc_id: request.doc_id,
        title: request.title,
        abstract_text: request.abstract_text,
        body: request.body,
        authors: request.authors,
    };

    let receipt = tokio::task::spawn_blocking(move || engine.add_document(payload))
        .await
        .map_err(|e| ApiError::Internal(format!("indexing task failed: {}", e)))??;

    Ok(Json(UploadResponse {
        success: true,
        doc_id: receipt.doc_id,
        indexing_time_ms: receipt.elapsed_ms,
        total_terms: receipt.total_terms,
        unique_terms: receipt.unique_terms,
        new_terms_added: receipt.new_lexicon_entries,
    }))
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        documents: state.engine.doc_count(),
        features: HealthFeatures {
            semantic_search: state.engine.semantic_enabled(),
            autocomplete: state.engine.autocomplete_enabled(),
        },
    })
}
