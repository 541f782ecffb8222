use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::models::node::{human_readable_size, SelectedFile};

/// Outcome of writing an archive. Per-file read failures never abort the
/// run; they are collected here and echoed into the archive itself.
#[derive(Debug)]
pub struct ArchiveSummary {
    pub written: usize,
    pub errors: Vec<(PathBuf, String)>,
    pub output_size: u64,
}

const RULE: &str = "======================================================================";

/// Concatenate the selected files into a single annotated text archive.
///
/// Plain sequential I/O: files are read one by one in the order given
/// (tree order, as produced by the selection). Content is taken lossily as
/// UTF-8 so binary stragglers degrade instead of failing.
pub fn export_archive(
    source_root: &Path,
    files: &[SelectedFile],
    output_path: &Path,
) -> anyhow::Result<ArchiveSummary> {
    let mut out = BufWriter::new(File::create(output_path)?);
    let mut errors: Vec<(PathBuf, String)> = Vec::new();

    writeln!(out, "{}", RULE)?;
    writeln!(out, "          CODEBUNDLE ARCHIVE")?;
    writeln!(out, "{}", RULE)?;
    writeln!(out)?;
    writeln!(out, "// Source Directory: {}", source_root.display())?;
    writeln!(out, "// Output File: {}", output_path.display())?;
    writeln!(out, "// Total Files: {}", files.len())?;
    writeln!(
        out,
        "// Compiled on: {}",
        Local::now().format("%Y-%m-%d at %H:%M:%S")
    )?;
    writeln!(out, "{}", RULE)?;
    writeln!(out)?;

    for file in files {
        let relative = file.path.strip_prefix(source_root).unwrap_or(&file.path);

        match std::fs::read(&file.path) {
            Ok(bytes) => {
                let content = String::from_utf8_lossy(&bytes);
                writeln!(out, "// {}", "=".repeat(67))?;
                writeln!(out, "// FILE: {}", relative.display())?;
                writeln!(out, "// Path: {}", file.path.display())?;
                writeln!(out, "// Size: {}", human_readable_size(file.size))?;
                writeln!(out, "// Last Modified: {}", format_modified(file.modified))?;
                writeln!(out, "// Lines: {}", content.lines().count())?;
                writeln!(out, "// {}", "=".repeat(67))?;
                writeln!(out)?;
                out.write_all(content.as_bytes())?;
                writeln!(out)?;
                writeln!(out)?;
            }
            Err(e) => {
                let message = format!("error reading {}: {}", relative.display(), e);
                tracing::warn!(path = %file.path.display(), error = %e, "skipping unreadable file");
                writeln!(out, "// ERROR: {}", message)?;
                writeln!(out)?;
                errors.push((file.path.clone(), message));
            }
        }
    }

    writeln!(out, "{}", RULE)?;
    writeln!(out, "          ARCHIVE COMPLETE")?;
    writeln!(out, "{}", RULE)?;
    writeln!(out)?;
    writeln!(out, "// Summary:")?;
    writeln!(
        out,
        "//   Successfully written: {} files",
        files.len() - errors.len()
    )?;
    writeln!(out, "//   Errors encountered: {} files", errors.len())?;
    if !errors.is_empty() {
        writeln!(out, "// Errors:")?;
        for (_, message) in errors.iter().take(10) {
            writeln!(out, "//   - {}", message)?;
        }
        if errors.len() > 10 {
            writeln!(out, "//   ... and {} more", errors.len() - 10)?;
        }
    }
    out.flush()?;
    drop(out);

    let output_size = std::fs::metadata(output_path).map(|m| m.len()).unwrap_or(0);
    Ok(ArchiveSummary {
        written: files.len() - errors.len(),
        errors,
        output_size,
    })
}

fn format_modified(modified: Option<std::time::SystemTime>) -> String {
    match modified {
        Some(time) => DateTime::<Local>::from(time)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        None => "unavailable".to_string(),
    }
}
