//! Text analysis: normalization and tokenization.
//!
//! Tokenization is deterministic: case-fold to lowercase, discard characters
//! that are not alphanumeric, split on whitespace. [`Tokens`] owns a single
//! lowercased buffer and hands out `&str` slices via byte spans, so a call
//! costs one heap allocation regardless of token count.
//!
//! Two entry points with different filtering:
//! - [`tokenize`]: the query-time tokenizer. Keeps every token; unknown
//!   surface forms are dropped later at lexicon resolution.
//! - [`index_tokens`]: the build/ingest tokenizer. Additionally removes stop
//!   words and single-character tokens, which never enter the lexicon.

use std::collections::HashSet;
use std::sync::LazyLock;

static STOP_WORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "a", "an", "the", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
        "from", "as", "is", "was", "are", "were", "been", "be", "have", "has", "had", "do",
        "does", "did", "will", "would", "could", "should", "may", "might", "must", "shall",
        "can", "this", "that", "these", "those", "i", "you", "he", "she", "it", "we", "they",
        "what", "which", "who", "whom", "where", "when", "why", "how", "all", "each", "every",
        "both", "few", "more", "most", "other", "some", "such", "no", "nor", "not", "only",
        "own", "same", "so", "than", "too", "very", "just", "also", "now", "here", "there",
        "then", "once", "if",
    ]
    .into_iter()
    .collect()
});

/// Returns `true` if `word` is a stop word excluded from indexing.
pub fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(word)
}

/// Tokenized text: owns the normalized buffer, provides `&str` slices via
/// byte spans.
pub struct Tokens {
    buffer: String,
    spans: Vec<(u32, u32)>,
}

impl Tokens {
    /// Iterate over the token slices in input order.
    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.spans
            .iter()
            .map(|&(s, e)| &self.buffer[s as usize..e as usize])
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }
}

/// Query-time tokenizer: lowercase, drop non-alphanumeric characters, split
/// on whitespace.
///
/// "COVID-19 vaccine!" tokenizes to `["covid19", "vaccine"]`.
pub fn tokenize(text: &str) -> Tokens {
    scan(text, |_| true)
}

/// Index-time tokenizer: [`tokenize`] plus stop word removal, and tokens must
/// be at least two characters long.
pub fn index_tokens(text: &str) -> Tokens {
    scan(text, |token| token.len() >= 2 && !is_stop_word(token))
}

fn scan(text: &str, keep: impl Fn(&str) -> bool) -> Tokens {
    let mut buffer = String::with_capacity(text.len());
    let mut spans = Vec::new();
    let mut start: Option<usize> = None;

    // Whitespace separates tokens; any other non-alphanumeric character is
    // deleted outright, joining its neighbors ("COVID-19" -> "covid19").
    for c in text.chars() {
        if c.is_whitespace() {
            flush(&mut buffer, &mut spans, &mut start, &keep);
        } else if c.is_alphanumeric() {
            if start.is_none() {
                start = Some(buffer.len());
            }
            for lower in c.to_lowercase() {
                buffer.push(lower);
            }
        }
    }
    flush(&mut buffer, &mut spans, &mut start, &keep);

    Tokens { buffer, spans }
}

fn flush(
    buffer: &mut String,
    spans: &mut Vec<(u32, u32)>,
    start: &mut Option<usize>,
    keep: &impl Fn(&str) -> bool,
) {
    if let Some(s) = start.take() {
        let token = &buffer[s..];
        if !token.is_empty() && keep(token) {
            spans.push((s as u32, buffer.len() as u32));
        } else {
            buffer.truncate(s);
        }
    }
}

/// Derive the lemma (canonical form) for a surface word.
///
/// Light suffix normalization in the spirit of a dictionary lemmatizer:
/// regular plurals fold onto the singular ("vaccines" -> "vaccine",
/// "studies" -> "study"). Anything it cannot safely strip is its own lemma.
/// Purely numeric tokens are handled by the lexicon, not here.
pub fn lemma_of(word: &str) -> String {
    let n = word.len();
    if n > 3 && word.ends_with("ies") {
        return format!("{}y", &word[..n - 3]);
    }
    if n > 3
        && (word.ends_with("ses")
            || word.ends_with("xes")
            || word.ends_with("zes")
            || word.ends_with("ches")
            || word.ends_with("shes"))
    {
        return word[..n - 2].to_string();
    }
    if n > 3 && word.ends_with('s') && !word.ends_with("ss") && !word.ends_with("us") {
        return word[..n - 1].to_string();
    }
    word.to_string()
}
