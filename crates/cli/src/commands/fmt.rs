//! `clipflow fmt`: print or rewrite a blueprint in canonical form.

use std::path::Path;

pub fn run(path: &Path, write: bool) -> Result<(), Box<dyn std::error::Error>> {
    let blueprint = clipflow_blueprint::load_file(path)?;
    let canonical = clipflow_blueprint::serialize(&blueprint);

    if write {
        std::fs::write(path, &canonical)
            .map_err(|e| format!("Failed to write {}: {e}", path.display()))?;
        tracing::info!(path = %path.display(), "Blueprint reformatted");
    } else {
        print!("{canonical}");
    }
    Ok(())
}
