//! `clipflow classify`: show how entries are categorised.

use std::path::PathBuf;

use clipflow_core::{ContentItem, RawEntry};

#[derive(clap::Args)]
pub struct ClassifyArgs {
    /// JSON file of entries (`-` for stdin)
    #[arg(short, long, conflicts_with = "text", required_unless_present = "text")]
    pub entries: Option<PathBuf>,

    /// Classify a single piece of text
    #[arg(short, long)]
    pub text: Option<String>,

    /// MIME type hint for `--text`
    #[arg(long, requires = "text")]
    pub hint: Option<String>,

    /// Print items as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: ClassifyArgs) -> Result<(), Box<dyn std::error::Error>> {
    let entries = match (&args.entries, args.text) {
        (Some(path), _) => super::read_entries(path)?,
        (None, Some(text)) => {
            let mut entry = RawEntry::new(text);
            if let Some(hint) = args.hint {
                entry = entry.with_hint(hint);
            }
            vec![entry]
        }
        (None, None) => return Err("either --entries or --text is required".into()),
    };

    let items = clipflow_classifier::classify_all(&entries);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else {
        for item in &items {
            println!("{}", describe(item));
        }
    }
    Ok(())
}

/// One line per item: id, category, metadata, and a short text preview.
fn describe(item: &ContentItem) -> String {
    let meta: Vec<String> = item
        .metadata
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect();
    let first_line = item.text.lines().next().unwrap_or_default();
    let preview: String = first_line.chars().take(48).collect();
    format!(
        "{}  {:<7}  {}  {:?}",
        item.id,
        item.category,
        meta.join(" "),
        preview
    )
}
