//! Code analyst: lists definitions, imports and TODO markers in a snippet.

use async_trait::async_trait;
use clipflow_classifier::keys;
use clipflow_core::{Category, ContentItem, Handler, HandlerError, Params, Role, RoleOutput};
use serde_json::json;

pub const NAME: &str = "code_analyst";

/// Line prefixes that introduce a named definition, across the languages
/// the classifier recognises.
const DEFINITION_PREFIXES: &[&str] = &[
    "pub async fn ",
    "pub fn ",
    "async fn ",
    "fn ",
    "pub struct ",
    "struct ",
    "pub enum ",
    "enum ",
    "pub trait ",
    "trait ",
    "async def ",
    "def ",
    "class ",
    "export function ",
    "async function ",
    "function ",
];

const IMPORT_PREFIXES: &[&str] = &["import ", "from ", "use ", "pub use ", "#include ", "source "];

const MARKERS: &[&str] = &["TODO", "FIXME", "XXX", "HACK"];

pub struct CodeAnalyst;

pub fn role() -> Role {
    Role::new(NAME, [Category::Code], CodeAnalyst)
        .with_description("Definitions, imports and TODO markers in a code snippet")
}

#[async_trait]
impl Handler for CodeAnalyst {
    async fn handle(&self, item: &ContentItem, _params: &Params) -> Result<RoleOutput, HandlerError> {
        let mut definitions = Vec::new();
        let mut imports = Vec::new();
        let mut todos = Vec::new();

        for (idx, line) in item.text.lines().enumerate() {
            let trimmed = line.trim();
            if let Some(name) = definition_name(trimmed) {
                definitions.push(name);
            }
            if IMPORT_PREFIXES.iter().any(|p| trimmed.starts_with(p))
                || trimmed.contains("require(")
            {
                imports.push(trimmed.trim_end_matches(';').to_string());
            }
            if MARKERS.iter().any(|m| trimmed.contains(m)) {
                todos.push(json!({ "line": idx + 1, "text": trimmed }));
            }
        }

        Ok(RoleOutput::structured(json!({
            "language": item.meta(keys::LANGUAGE).unwrap_or("generic"),
            "lines": item.text.lines().count(),
            "definitions": definitions,
            "imports": imports,
            "todos": todos,
        })))
    }
}

fn definition_name(line: &str) -> Option<String> {
    let rest = DEFINITION_PREFIXES
        .iter()
        .find_map(|p| line.strip_prefix(p))?;
    let name: String = rest
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .collect();
    (!name.is_empty()).then_some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn analyze(item: ContentItem) -> serde_json::Map<String, serde_json::Value> {
        match CodeAnalyst.handle(&item, &Params::new()).await.unwrap() {
            RoleOutput::Structured(map) => map,
            RoleOutput::Text(t) => panic!("unexpected text output {t}"),
        }
    }

    #[tokio::test]
    async fn python_snippet() {
        let src = "import os\nfrom pathlib import Path\n\nclass Loader:\n    def load(self):\n        # TODO: cache\n        return Path(os.getcwd())\n";
        let item = ContentItem::new("c", src, Category::Code).with_meta("language", "python");
        let out = analyze(item).await;

        assert_eq!(out["language"], "python");
        assert_eq!(out["lines"], 7);
        assert_eq!(out["definitions"], json!(["Loader", "load"]));
        assert_eq!(out["imports"], json!(["import os", "from pathlib import Path"]));
        assert_eq!(out["todos"], json!([{ "line": 6, "text": "# TODO: cache" }]));
    }

    #[tokio::test]
    async fn rust_snippet_without_language_meta() {
        let src = "use std::io;\n\npub fn main() {}\nstruct Point { x: i32 }\n";
        let out = analyze(ContentItem::new("c", src, Category::Code)).await;

        assert_eq!(out["language"], "generic");
        assert_eq!(out["definitions"], json!(["main", "Point"]));
        assert_eq!(out["imports"], json!(["use std::io"]));
        assert_eq!(out["todos"], json!([]));
    }

    #[test]
    fn definition_names() {
        assert_eq!(definition_name("async def fetch(url):"), Some("fetch".into()));
        assert_eq!(definition_name("function render() {"), Some("render".into()));
        assert_eq!(definition_name("fn (x)"), None);
        assert_eq!(definition_name("let x = 1;"), None);
    }
}
