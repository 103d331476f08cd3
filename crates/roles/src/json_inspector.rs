//! JSON inspector: describes the shape of a JSON document.
//!
//! With a `pointer` parameter (RFC 6901, e.g. `/items/0/id`) the referenced
//! value is included in the report; a pointer that resolves to nothing is a
//! handler error.

use async_trait::async_trait;
use clipflow_core::{Category, ContentItem, Handler, HandlerError, Params, Role, RoleOutput};
use serde_json::{Value, json};

use crate::params;

pub const NAME: &str = "json_inspector";

/// Object keys listed in the report.
const MAX_KEYS: usize = 20;

pub struct JsonInspector;

pub fn role() -> Role {
    Role::new(NAME, [Category::Json], JsonInspector)
        .with_description("Type, size and depth of a JSON document, with optional pointer lookup")
}

#[async_trait]
impl Handler for JsonInspector {
    async fn handle(&self, item: &ContentItem, params: &Params) -> Result<RoleOutput, HandlerError> {
        let doc: Value = serde_json::from_str(&item.text)
            .map_err(|e| HandlerError::new(format!("invalid JSON: {e}")))?;

        let mut report = json!({
            "type": type_name(&doc),
            "size": size(&doc),
            "depth": depth(&doc),
        });
        if let Value::Object(map) = &doc {
            report["keys"] = map.keys().take(MAX_KEYS).cloned().collect();
        }
        if let Some(pointer) = params::optional_str(params, "pointer")? {
            let selected = doc
                .pointer(pointer)
                .ok_or_else(|| HandlerError::new(format!("pointer '{pointer}' not found")))?;
            report["pointer"] = json!(pointer);
            report["selected"] = selected.clone();
        }
        Ok(RoleOutput::structured(report))
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Entries for containers, characters for strings, 1 for scalars.
fn size(value: &Value) -> usize {
    match value {
        Value::Array(items) => items.len(),
        Value::Object(map) => map.len(),
        Value::String(s) => s.chars().count(),
        _ => 1,
    }
}

/// Nesting depth; scalars are 0, `[]` and `{}` are 1.
fn depth(value: &Value) -> usize {
    match value {
        Value::Array(items) => 1 + items.iter().map(depth).max().unwrap_or(0),
        Value::Object(map) => 1 + map.values().map(depth).max().unwrap_or(0),
        _ => 0,
    }
}
