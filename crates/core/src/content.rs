//! Content types: raw clipboard entries and their classified form.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Item metadata. Ordered so serialized output is stable.
pub type Metadata = BTreeMap<String, String>;

/// The classifier's semantic label for a piece of content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Code,
    Sql,
    Json,
    Url,
    Text,
    Unknown,
}

impl Category {
    /// Every category, in declaration order.
    pub const ALL: [Category; 6] = [
        Category::Code,
        Category::Sql,
        Category::Json,
        Category::Url,
        Category::Text,
        Category::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Code => "code",
            Category::Sql => "sql",
            Category::Json => "json",
            Category::Url => "url",
            Category::Text => "text",
            Category::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown category: {s}"))
    }
}

/// A raw entry as supplied by the clipboard/transport collaborator.
///
/// Field aliases accept rows exported from the clipboard history database
/// (`uuid`, `mimetypes`, `added_time`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawEntry {
    /// Stable identifier, if the source has one.
    #[serde(default, alias = "uuid", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// The copied text.
    #[serde(default)]
    pub text: String,

    /// MIME type or other type hint.
    #[serde(default, alias = "mimetypes", skip_serializing_if = "Option::is_none")]
    pub type_hint: Option<String>,

    /// When the entry was captured (unix seconds).
    #[serde(default, alias = "added_time")]
    pub timestamp: f64,
}

impl RawEntry {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.type_hint = Some(hint.into());
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn at(mut self, timestamp: f64) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// A classified unit of text flowing through a blueprint.
///
/// Immutable once classified; the router and handlers only read it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: String,

    pub text: String,

    pub category: Category,

    #[serde(default)]
    pub metadata: Metadata,

    /// Capture time, when the source supplied one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captured_at: Option<DateTime<Utc>>,
}

impl ContentItem {
    pub fn new(id: impl Into<String>, text: impl Into<String>, category: Category) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            category,
            metadata: Metadata::new(),
            captured_at: None,
        }
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_captured_at(mut self, at: DateTime<Utc>) -> Self {
        self.captured_at = Some(at);
        self
    }

    /// Look up a metadata value.
    pub fn meta(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }
}
