//! Built-in roles for clipflow.
//!
//! Each role inspects one kind of clipboard content and returns a
//! structured report:
//! - `sql_reviewer`: statement kind, referenced tables and risky patterns
//! - `code_analyst`: definitions, imports and TODO markers
//! - `json_inspector`: shape of a JSON document, with optional pointer lookup
//! - `link_collector`: URLs and hosts found in text
//! - `text_summarizer`: first-sentence preview and word count

pub mod code_analyst;
pub mod json_inspector;
pub mod link_collector;
mod params;
pub mod sql_reviewer;
pub mod text_summarizer;

use clipflow_core::{Role, RoleRegistry};

/// All built-in roles.
pub fn builtin_roles() -> Vec<Role> {
    vec![
        sql_reviewer::role(),
        code_analyst::role(),
        json_inspector::role(),
        link_collector::role(),
        text_summarizer::role(),
    ]
}

/// Create a registry holding every built-in role.
pub fn default_registry() -> RoleRegistry {
    let mut registry = RoleRegistry::new();
    for role in builtin_roles() {
        if let Err(err) = registry.register_role(role) {
            tracing::warn!(error = %err, "Skipping built-in role");
        }
    }
    registry
}
