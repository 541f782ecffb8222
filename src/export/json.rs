use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::node::SelectedFile;

#[derive(Serialize)]
struct Manifest<'a> {
    root: &'a Path,
    generated_at: DateTime<Utc>,
    total_files: usize,
    total_size: u64,
    files: &'a [SelectedFile],
}

/// Write the selection as a pretty-printed JSON manifest.
pub fn export_manifest(
    root: &Path,
    files: &[SelectedFile],
    output_path: &Path,
) -> anyhow::Result<()> {
    let manifest = Manifest {
        root,
        generated_at: Utc::now(),
        total_files: files.len(),
        total_size: files.iter().map(|f| f.size).sum(),
        files,
    };
    let json = serde_json::to_string_pretty(&manifest)?;
    std::fs::write(output_path, json)?;
    Ok(())
}
