//! Subcommand implementations.

pub mod check;
pub mod classify;
pub mod config_cmd;
pub mod fmt;
pub mod predict;
pub mod roles;
pub mod run;
pub mod serve;

use std::io::Read;
use std::path::Path;

use clipflow_core::RawEntry;
use serde::Deserialize;

/// Accepted shapes of an entries file.
#[derive(Deserialize)]
#[serde(untagged)]
enum EntriesFile {
    List(Vec<RawEntry>),
    Wrapped { entries: Vec<RawEntry> },
}

/// Read clipboard entries from a JSON file, or stdin when `path` is `-`.
///
/// Either a bare array of entries or `{"entries": [...]}` is accepted.
pub fn read_entries(path: &Path) -> Result<Vec<RawEntry>, Box<dyn std::error::Error>> {
    let raw = if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {e}", path.display()))?
    };
    parse_entries(&raw).map_err(|e| format!("Invalid entries in {}: {e}", path.display()).into())
}

fn parse_entries(raw: &str) -> Result<Vec<RawEntry>, serde_json::Error> {
    Ok(match serde_json::from_str(raw)? {
        EntriesFile::List(entries) | EntriesFile::Wrapped { entries } => entries,
    })
}
