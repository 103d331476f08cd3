//! Line-oriented blueprint source format.
//!
//! ```text
//! ⫻kicklang:orchestration
//! blueprint: clipboard-triage
//! owner: platform-team
//!
//! # SQL first, then anything that looks like code.
//! step review-sql:
//!     when: category == sql AND text CONTAINS "FROM"
//!     role: sql_reviewer
//!     param.dialect: "postgres"
//!     param.max_rows: 50
//!
//! step analyze:
//!     when: category == code OR step.review-sql == failed
//!     role: code_analyst
//! ```

use std::collections::HashSet;
use std::fmt::Write as _;
use std::path::Path;

use clipflow_core::{Metadata, Params};

use crate::BlueprintError;
use crate::condition::{Predicate, parse_condition};
use crate::model::{Blueprint, DEFAULT_NAME, Step};

const HEADER_MARK: char = '⫻';
const INDENT: &str = "    ";

/// A step block still being read.
struct Draft {
    line: usize,
    name: String,
    condition: Predicate,
    role: Option<String>,
    parameters: Params,
    metadata: Metadata,
    keys: HashSet<String>,
}

impl Draft {
    fn finish(self) -> Result<Step, BlueprintError> {
        let Some(target_role) = self.role else {
            return Err(syntax(self.line, format!("step '{}' has no role", self.name)));
        };
        Ok(Step {
            index: 0,
            name: self.name,
            condition: self.condition,
            target_role,
            parameters: self.parameters,
            metadata: self.metadata,
        })
    }
}

fn syntax(line: usize, message: impl Into<String>) -> BlueprintError {
    BlueprintError::Syntax {
        line,
        message: message.into(),
    }
}

fn valid_step_name(name: &str) -> bool {
    name.chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

fn split_key_value(line: usize, text: &str) -> Result<(&str, &str), BlueprintError> {
    let Some((key, value)) = text.split_once(':') else {
        return Err(syntax(line, format!("expected 'key: value', got '{text}'")));
    };
    let key = key.trim();
    if key.is_empty() {
        return Err(syntax(line, "missing key before ':'"));
    }
    Ok((key, value.trim()))
}

/// Parse blueprint source text.
///
/// Fails fast with [`BlueprintError::Syntax`] on the first malformed line.
pub fn parse(source: &str) -> Result<Blueprint, BlueprintError> {
    let mut blueprint = Blueprint::new(DEFAULT_NAME);
    let mut top_keys: HashSet<String> = HashSet::new();
    let mut step_names: HashSet<String> = HashSet::new();
    let mut current: Option<Draft> = None;

    for (idx, raw) in source.lines().enumerate() {
        let line = idx + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        if raw.starts_with(' ') || raw.starts_with('\t') {
            let Some(draft) = current.as_mut() else {
                return Err(syntax(line, "indented line outside a step block"));
            };
            let (key, value) = split_key_value(line, trimmed)?;
            if !draft.keys.insert(key.to_string()) {
                return Err(syntax(
                    line,
                    format!("duplicate key '{key}' in step '{}'", draft.name),
                ));
            }

            match key {
                "when" => {
                    let condition = parse_condition(value)
                        .map_err(|e| syntax(line, format!("invalid condition: {e}")))?;
                    if let Some(dep) = condition
                        .step_refs()
                        .into_iter()
                        .find(|dep| !step_names.contains(*dep))
                    {
                        return Err(syntax(
                            line,
                            format!(
                                "condition refers to step '{dep}', which is not declared before '{}'",
                                draft.name
                            ),
                        ));
                    }
                    draft.condition = condition;
                }
                "role" => {
                    if value.is_empty() {
                        return Err(syntax(line, "role is empty"));
                    }
                    draft.role = Some(value.to_string());
                }
                _ => {
                    if let Some(param) = key.strip_prefix("param.") {
                        if param.is_empty() {
                            return Err(syntax(line, "parameter name is empty"));
                        }
                        let parsed = serde_json::from_str(value)
                            .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
                        draft.parameters.insert(param.to_string(), parsed);
                    } else {
                        draft.metadata.insert(key.to_string(), value.to_string());
                    }
                }
            }
            continue;
        }

        // Any non-indented line closes the open step block.
        if let Some(draft) = current.take() {
            let name = draft.name.clone();
            blueprint.push(draft.finish()?);
            step_names.insert(name);
        }

        if trimmed.starts_with(HEADER_MARK) {
            blueprint.format.push(trimmed.to_string());
            continue;
        }

        if let Some(rest) = trimmed.strip_prefix("step").filter(|r| r.starts_with(char::is_whitespace)) {
            let Some(name) = rest.trim().strip_suffix(':') else {
                return Err(syntax(line, "expected ':' after step name"));
            };
            let name = name.trim();
            if name.is_empty() {
                return Err(syntax(line, "step name is empty"));
            }
            if !valid_step_name(name) {
                return Err(syntax(
                    line,
                    format!("invalid step name '{name}' (use letters, digits, '_', '.', '-')"),
                ));
            }
            if step_names.contains(name) {
                return Err(syntax(line, format!("duplicate step name '{name}'")));
            }
            current = Some(Draft {
                line,
                name: name.to_string(),
                condition: Predicate::Always,
                role: None,
                parameters: Params::new(),
                metadata: Metadata::new(),
                keys: HashSet::new(),
            });
            continue;
        }

        let (key, value) = split_key_value(line, trimmed)?;
        if !top_keys.insert(key.to_string()) {
            return Err(syntax(line, format!("duplicate top-level key '{key}'")));
        }
        if key == "blueprint" {
            if value.is_empty() {
                return Err(syntax(line, "blueprint name is empty"));
            }
            blueprint.name = value.to_string();
        } else {
            blueprint.metadata.insert(key.to_string(), value.to_string());
        }
    }

    if let Some(draft) = current.take() {
        blueprint.push(draft.finish()?);
    }

    tracing::debug!(
        blueprint = %blueprint.name,
        steps = blueprint.steps.len(),
        "Parsed blueprint"
    );
    Ok(blueprint)
}

/// Render a blueprint in canonical source form.
///
/// `parse(&serialize(&parse(s)?))` equals `parse(s)` for every well-formed `s`.
pub fn serialize(blueprint: &Blueprint) -> String {
    let mut out = String::new();
    for header in &blueprint.format {
        let _ = writeln!(out, "{header}");
    }
    let _ = writeln!(out, "blueprint: {}", blueprint.name);
    for (key, value) in &blueprint.metadata {
        let _ = writeln!(out, "{key}: {value}");
    }

    for step in &blueprint.steps {
        out.push('\n');
        let _ = writeln!(out, "step {}:", step.name);
        if step.condition != Predicate::Always {
            let _ = writeln!(out, "{INDENT}when: {}", step.condition);
        }
        let _ = writeln!(out, "{INDENT}role: {}", step.target_role);
        for (key, value) in &step.parameters {
            // Strings stay JSON-quoted so "50" does not come back as 50.
            let _ = writeln!(out, "{INDENT}param.{key}: {value}");
        }
        for (key, value) in &step.metadata {
            let _ = writeln!(out, "{INDENT}{key}: {value}");
        }
    }
    out
}

/// Read and parse a blueprint file.
pub fn load_file(path: impl AsRef<Path>) -> Result<Blueprint, BlueprintError> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path)?;
    let blueprint = parse(&source)?;
    tracing::info!(
        path = %path.display(),
        blueprint = %blueprint.name,
        steps = blueprint.steps.len(),
        "Loaded blueprint"
    );
    Ok(blueprint)
}
