//! Raw corpus access: locating and parsing document JSON files.
//!
//! The engine itself is dataset-agnostic; this module understands the few
//! JSON shapes the corpus ships in. A document that fails to parse is
//! skipped with a warning, never fatal to a build.

use serde_json::Value;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A parsed raw document, ready for tokenization.
#[derive(Debug, Clone, Default)]
pub struct RawDocument {
    pub doc_id: String,
    pub title: String,
    pub abstract_text: String,
    pub body: String,
}

/// All `.json` files directly inside the corpus directory, sorted by name
/// so builds are reproducible.
pub fn corpus_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .max_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().and_then(|s| s.to_str()) == Some("json"))
        .collect();
    files.sort();
    files
}

/// Parse one corpus file. The document ID is the file stem.
///
/// Recognized shapes, most specific first:
/// - `{"metadata": {"title"}, "abstract": [{"text"}], "body_text": [{"text"}]}`
/// - flat `{"title", "abstract", "body_text" | "content" | "text"}` with
///   string values
pub fn parse_document(path: &Path) -> io::Result<RawDocument> {
    let raw = fs::read_to_string(path)?;
    let json: Value = serde_json::from_str(&raw).map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("{}: {}", path.display(), e),
        )
    })?;

    let doc_id = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string();
    if doc_id.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("{}: cannot derive document ID", path.display()),
        ));
    }

    let title = json
        .pointer("/metadata/title")
        .or_else(|| json.get("title"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let abstract_text = section_text(json.get("abstract"));
    let body = if let Some(body) = json.get("body_text") {
        section_text(Some(body))
    } else if let Some(content) = json.get("content").or_else(|| json.get("text")) {
        content.as_str().unwrap_or_default().to_string()
    } else {
        String::new()
    };

    Ok(RawDocument {
        doc_id,
        title,
        abstract_text,
        body,
    })
}

/// A section is either a plain string or a list of `{"text": ..}` entries.
fn section_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(entries)) => {
            let mut out = String::new();
            for entry in entries {
                if let Some(text) = entry.get("text").and_then(Value::as_str) {
                    if !out.is_empty() {
                        out.push(' ');
                    }
                    out.push_str(text);
                }
            }
            out
        }
        _ => String::new(),
    }
}
