//! Content classification for clipboard entries.
//!
//! `classify` turns a [`RawEntry`] into an immutable [`ContentItem`]. The
//! category is decided in four stages, first hit wins:
//!
//! 1. **Exact hint**: the MIME hint (parameters stripped, lowercased) is
//!    looked up in a fixed table.
//! 2. **Hint heuristics**: ordered substring checks against the hint.
//! 3. **Text signatures**: URL, JSON, SQL and code detection on the text.
//! 4. **Fallback**: `text` when non-empty, `unknown` when empty.
//!
//! Classification is pure and total: the same entry always yields the same
//! item, and nothing here can fail.

pub mod analyzer;
pub mod signatures;

use chrono::{DateTime, Utc};
use clipflow_core::{Category, ContentItem, RawEntry};
use sha2::{Digest, Sha256};
use tracing::trace;

pub use analyzer::{Workflow, WorkflowPrediction, cluster_by_time, predict_workflow};
pub use signatures::Language;

/// Metadata keys written by the classifier.
pub mod keys {
    pub const MIME: &str = "mime";
    pub const ROUTE: &str = "route";
    pub const LINES: &str = "lines";
    pub const CHARS: &str = "chars";
    pub const LANGUAGE: &str = "language";
    pub const VALID_JSON: &str = "valid_json";
}

/// MIME types that map to exactly one category.
const HINT_TABLE: &[(&str, Category)] = &[
    ("application/json", Category::Json),
    ("text/json", Category::Json),
    ("application/ld+json", Category::Json),
    ("application/sql", Category::Sql),
    ("application/x-sql", Category::Sql),
    ("text/x-sql", Category::Sql),
    ("text/x-python", Category::Code),
    ("application/x-python-code", Category::Code),
    ("text/javascript", Category::Code),
    ("application/javascript", Category::Code),
    ("text/typescript", Category::Code),
    ("text/css", Category::Code),
    ("text/x-rust", Category::Code),
    ("text/x-shellscript", Category::Code),
    ("application/x-sh", Category::Code),
    ("text/uri-list", Category::Url),
    ("text/x-moz-url", Category::Url),
    ("x-special/gnome-copied-files", Category::Url),
];

/// Ordered substring checks for hints not in [`HINT_TABLE`].
const HINT_HEURISTICS: &[(&str, Category)] = &[
    ("json", Category::Json),
    ("sql", Category::Sql),
    ("uri", Category::Url),
    ("url", Category::Url),
    ("python", Category::Code),
    ("javascript", Category::Code),
    ("ecmascript", Category::Code),
    ("typescript", Category::Code),
    ("x-rust", Category::Code),
    ("x-csrc", Category::Code),
    ("x-c++", Category::Code),
    ("x-java", Category::Code),
    ("shellscript", Category::Code),
    ("x-sh", Category::Code),
];

/// Which classification stage produced the category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Hint,
    HintHeuristic,
    Content,
    Empty,
}

impl Route {
    pub fn as_str(&self) -> &'static str {
        match self {
            Route::Hint => "hint",
            Route::HintHeuristic => "hint-heuristic",
            Route::Content => "content",
            Route::Empty => "empty",
        }
    }
}

/// Classify a raw entry into a content item.
pub fn classify(entry: &RawEntry) -> ContentItem {
    let hint = entry.type_hint.as_deref().map(normalize_hint);
    let hint = hint.as_deref().filter(|h| !h.is_empty());

    let (category, route) = categorize(hint, &entry.text);

    let id = entry
        .id
        .clone()
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| derive_id(entry));

    let mut item = ContentItem::new(id, entry.text.clone(), category)
        .with_meta(keys::ROUTE, route.as_str())
        .with_meta(keys::LINES, entry.text.lines().count().to_string())
        .with_meta(keys::CHARS, entry.text.chars().count().to_string());

    if let Some(h) = hint {
        item = item.with_meta(keys::MIME, h);
    }

    match category {
        Category::Code => {
            let language = hint
                .and_then(Language::from_hint)
                .or_else(|| signatures::detect_language(&entry.text))
                .unwrap_or(Language::Generic);
            item = item.with_meta(keys::LANGUAGE, language.as_str());
        }
        Category::Json => {
            let valid = serde_json::from_str::<serde_json::Value>(entry.text.trim()).is_ok();
            item = item.with_meta(keys::VALID_JSON, valid.to_string());
        }
        _ => {}
    }

    if let Some(at) = timestamp_to_utc(entry.timestamp) {
        item = item.with_captured_at(at);
    }

    trace!(id = %item.id, category = %category, route = route.as_str(), "Classified entry");
    item
}

/// Classify a batch, preserving order.
pub fn classify_all(entries: &[RawEntry]) -> Vec<ContentItem> {
    entries.iter().map(classify).collect()
}

fn categorize(hint: Option<&str>, text: &str) -> (Category, Route) {
    if let Some(h) = hint {
        if let Some((_, category)) = HINT_TABLE.iter().find(|(mime, _)| *mime == h) {
            return (*category, Route::Hint);
        }
        if let Some((_, category)) = HINT_HEURISTICS.iter().find(|(needle, _)| h.contains(needle)) {
            return (*category, Route::HintHeuristic);
        }
    }

    let trimmed = text.trim();
    if trimmed.is_empty() {
        return (Category::Unknown, Route::Empty);
    }
    (signatures::detect_category(trimmed), Route::Content)
}

/// Strip MIME parameters (`; charset=utf-8`) and lowercase.
fn normalize_hint(hint: &str) -> String {
    hint.split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Deterministic id: first 16 hex chars of SHA-256 over timestamp, hint and text.
fn derive_id(entry: &RawEntry) -> String {
    let mut hasher = Sha256::new();
    hasher.update(entry.timestamp.to_bits().to_be_bytes());
    hasher.update([0x1f]);
    hasher.update(entry.type_hint.as_deref().unwrap_or_default().as_bytes());
    hasher.update([0x1f]);
    hasher.update(entry.text.as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..16].to_string()
}

fn timestamp_to_utc(timestamp: f64) -> Option<DateTime<Utc>> {
    if !timestamp.is_finite() || timestamp <= 0.0 {
        return None;
    }
    let secs = timestamp.trunc() as i64;
    let nanos = ((timestamp.fract()) * 1e9).round().min(999_999_999.0) as u32;
    DateTime::from_timestamp(secs, nanos)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_hint_wins_over_content() {
        let entry = RawEntry::new("just some words").with_hint("application/json; charset=utf-8");
        let item = classify(&entry);
        assert_eq!(item.category, Category::Json);
        assert_eq!(item.meta(keys::ROUTE), Some("hint"));
        assert_eq!(item.meta(keys::MIME), Some("application/json"));
        assert_eq!(item.meta(keys::VALID_JSON), Some("false"));
    }

    #[test]
    fn hint_heuristics_are_ordered() {
        let item = classify(&RawEntry::new("x").with_hint("application/vnd.api+json"));
        assert_eq!(item.category, Category::Json);
        assert_eq!(item.meta(keys::ROUTE), Some("hint-heuristic"));

        let item = classify(&RawEntry::new("x").with_hint("text/x-python3"));
        assert_eq!(item.category, Category::Code);
        assert_eq!(item.meta(keys::LANGUAGE), Some("python"));
    }

    #[test]
    fn plain_text_hint_falls_through_to_content() {
        let item = classify(&RawEntry::new("SELECT id FROM users").with_hint("text/plain"));
        assert_eq!(item.category, Category::Sql);
        assert_eq!(item.meta(keys::ROUTE), Some("content"));
    }

    #[test]
    fn text_signatures() {
        let cases = [
            ("https://example.com/docs", Category::Url),
            ("{\"a\": 1}", Category::Json),
            ("[1, 2, 3]", Category::Json),
            ("select * from orders where id = 4", Category::Sql),
            ("INSERT INTO t (a) VALUES (1);", Category::Sql),
            ("def main():\n    return 0", Category::Code),
            ("import os", Category::Code),
            ("Remember to buy milk", Category::Text),
        ];
        for (text, expected) in cases {
            assert_eq!(classify(&RawEntry::new(text)).category, expected, "{text}");
        }
    }

    #[test]
    fn empty_text_is_unknown() {
        let item = classify(&RawEntry::new("   \n "));
        assert_eq!(item.category, Category::Unknown);
        assert_eq!(item.meta(keys::ROUTE), Some("empty"));
    }

    #[test]
    fn classify_is_idempotent() {
        for category in Category::ALL {
            let hint = match category {
                Category::Code => "text/x-python",
                Category::Sql => "application/sql",
                Category::Json => "application/json",
                Category::Url => "text/uri-list",
                Category::Text | Category::Unknown => "text/plain",
            };
            let text = if category == Category::Unknown { "" } else { "payload" };
            let entry = RawEntry::new(text).with_hint(hint).at(1_700_000_000.25);
            assert_eq!(classify(&entry), classify(&entry));
        }
    }

    #[test]
    fn derived_id_is_stable_and_short() {
        let entry = RawEntry::new("hello").at(10.0);
        let a = classify(&entry);
        let b = classify(&entry);
        assert_eq!(a.id, b.id);
        assert_eq!(a.id.len(), 16);

        let other = classify(&RawEntry::new("hello").at(11.0));
        assert_ne!(a.id, other.id);
    }

    #[test]
    fn supplied_id_is_kept() {
        let item = classify(&RawEntry::new("hello").with_id("abc-1"));
        assert_eq!(item.id, "abc-1");
    }

    #[test]
    fn timestamp_becomes_captured_at() {
        let item = classify(&RawEntry::new("x").at(1_700_000_000.5));
        let at = item.captured_at.unwrap();
        assert_eq!(at.timestamp(), 1_700_000_000);
        assert_eq!(at.timestamp_subsec_millis(), 500);

        assert!(classify(&RawEntry::new("x")).captured_at.is_none());
    }

    #[test]
    fn line_and_char_counts() {
        let item = classify(&RawEntry::new("héllo\nworld"));
        assert_eq!(item.meta(keys::LINES), Some("2"));
        assert_eq!(item.meta(keys::CHARS), Some("11"));
    }
}
