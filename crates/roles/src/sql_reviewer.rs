//! SQL reviewer: reports the statement kind, referenced tables and risky
//! patterns in a SQL snippet.
//!
//! This is a token scan, not a SQL parser. It is meant to give a quick
//! read of a copied query, not to validate it.

use async_trait::async_trait;
use clipflow_core::{Category, ContentItem, Handler, HandlerError, Params, Role, RoleOutput};
use serde_json::json;

use crate::params;

pub const NAME: &str = "sql_reviewer";
const DEFAULT_DIALECT: &str = "ansi";

/// Keywords after which the next token names a table.
const TABLE_MARKERS: &[&str] = &["FROM", "JOIN", "INTO", "UPDATE", "TABLE"];

const STATEMENT_KINDS: &[&str] = &[
    "SELECT", "INSERT", "UPDATE", "DELETE", "CREATE", "ALTER", "DROP", "TRUNCATE", "WITH",
    "MERGE", "REPLACE", "GRANT", "REVOKE",
];

pub struct SqlReviewer;

pub fn role() -> Role {
    Role::new(NAME, [Category::Sql], SqlReviewer)
        .with_description("Statement kind, referenced tables and risky patterns in SQL")
}

#[async_trait]
impl Handler for SqlReviewer {
    async fn handle(&self, item: &ContentItem, params: &Params) -> Result<RoleOutput, HandlerError> {
        let dialect = params::optional_str(params, "dialect")?.unwrap_or(DEFAULT_DIALECT);
        let tokens = tokenize(&item.text);
        if tokens.is_empty() {
            return Err(HandlerError::new("empty SQL statement"));
        }

        let statement = statement_kind(&tokens);
        Ok(RoleOutput::structured(json!({
            "statement": statement,
            "tables": referenced_tables(&tokens),
            "warnings": warnings(&tokens, statement),
            "dialect": dialect,
        })))
    }
}

/// Split into words, keeping `*` and `;` as tokens of their own.
fn tokenize(sql: &str) -> Vec<String> {
    let spaced = sql
        .replace(',', " , ")
        .replace(';', " ; ")
        .replace('(', " ( ")
        .replace(')', " ) ");
    spaced.split_whitespace().map(str::to_string).collect()
}

fn statement_kind(tokens: &[String]) -> &'static str {
    tokens
        .first()
        .and_then(|first| {
            let upper = first.to_ascii_uppercase();
            STATEMENT_KINDS.iter().copied().find(|kind| *kind == upper)
        })
        .unwrap_or("UNKNOWN")
}

fn referenced_tables(tokens: &[String]) -> Vec<String> {
    let mut tables: Vec<String> = Vec::new();
    for pair in tokens.windows(2) {
        let marker = pair[0].to_ascii_uppercase();
        if !TABLE_MARKERS.contains(&marker.as_str()) {
            continue;
        }
        let name = pair[1].trim_matches(|c| matches!(c, '"' | '`' | '[' | ']'));
        let is_identifier = name
            .chars()
            .next()
            .is_some_and(|c| c.is_alphabetic() || c == '_');
        if is_identifier
            && !name.eq_ignore_ascii_case("select")
            && !tables.iter().any(|t| t.eq_ignore_ascii_case(name))
        {
            tables.push(name.to_string());
        }
    }
    tables
}

fn warnings(tokens: &[String], statement: &str) -> Vec<&'static str> {
    let has = |kw: &str| tokens.iter().any(|t| t.eq_ignore_ascii_case(kw));
    let mut out = Vec::new();
    if tokens
        .windows(2)
        .any(|w| w[0].eq_ignore_ascii_case("select") && w[1] == "*")
    {
        out.push("SELECT * returns every column");
    }
    if matches!(statement, "UPDATE" | "DELETE") && !has("where") {
        out.push("UPDATE/DELETE without WHERE touches every row");
    }
    if matches!(statement, "DROP" | "TRUNCATE") {
        out.push("destructive statement");
    }
    out
}
