//! API error types mapped to HTTP status codes.
//!
//! Each [`ApiError`] variant maps to a status code and produces a JSON body
//! `{"error": "message"}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use papyrus_core::IngestError;
use serde_json::json;

/// Application-level error type that implements `IntoResponse`.
#[derive(Debug)]
pub enum ApiError {
    /// Invalid request parameters (400).
    BadRequest(String),
    /// Resource already exists (409).
    Conflict(String),
    /// Query deadline expired (408).
    Timeout(String),
    /// Unexpected server error (500).
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Timeout(msg) => (StatusCode::REQUEST_TIMEOUT, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        let body = axum::Json(json!({ "error": message }));
        (status, body).into_response()
    }
}

impl From<IngestError> for ApiError {
    fn from(e: IngestError) -> Self {
        match e {
            IngestError::InvalidDocId(_) | IngestError::EmptyDocument => {
                ApiError::BadRequest(e.to_string())
            }
            IngestError::DuplicateDocId(_) => ApiError::Conflict(e.to_string()),
            IngestError::Io(_) => ApiError::Internal(e.to_string()),
        }
    }
}
