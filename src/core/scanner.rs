use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::settings::Settings;
use crate::models::node::{FileMeta, NodeId, NodeKind};
use crate::models::tree::DiscoveredNode;

use super::events::{EventSender, ScanEvent};
use super::progress::ProgressTracker;

/// Walks a directory tree and streams `ScanEvent`s to the dispatcher.
///
/// The walk is a single sequential pre-order traversal: a directory's event
/// is emitted before any of its children, and children arrive in a fixed
/// order (directories first, then case-insensitive name). That ordering is
/// a contract with the tree store, whose child lists mirror emission order.
///
/// Cancellation is cooperative: the shared flag is checked before every
/// entry, so at most a handful of already-listed entries trail a cancel
/// request. Exactly one terminal event ends every scan.
pub struct Scanner {
    settings: Arc<Settings>,
    event_tx: EventSender,
    cancel: Arc<AtomicBool>,
    progress: Arc<ProgressTracker>,
    next_id: u64,
    since_progress: usize,
}

/// Whether the walk ran to completion or observed the cancel flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Walk {
    Continue,
    Cancelled,
}

impl Scanner {
    pub fn new(
        settings: Settings,
        event_tx: EventSender,
        cancel: Arc<AtomicBool>,
        progress: Arc<ProgressTracker>,
    ) -> Self {
        Self {
            settings: Arc::new(settings),
            event_tx,
            cancel,
            progress,
            next_id: 0,
            since_progress: 0,
        }
    }

    /// Run the scan to its terminal event. Consumes the scanner; ids are
    /// only dense within a single run.
    pub async fn scan(mut self, root: PathBuf) {
        tracing::info!(root = %root.display(), "scan started");

        // A missing or unlistable root is the one unrecoverable failure.
        let root_check = {
            let path = root.clone();
            tokio::task::spawn_blocking(move || std::fs::metadata(&path)).await
        };
        let failure = match root_check {
            Ok(Ok(meta)) if meta.is_dir() => None,
            Ok(Ok(_)) => Some(format!("{} is not a directory", root.display())),
            Ok(Err(e)) => Some(format!("cannot read {}: {}", root.display(), e)),
            Err(e) => Some(format!("scan task failed: {}", e)),
        };
        if let Some(message) = failure {
            tracing::error!(%message, "scan failed");
            let _ = self.event_tx.send(ScanEvent::Failed { message });
            return;
        }

        match self.walk_dir(root, None, 1).await {
            Ok(Walk::Continue) => {
                let snapshot = self.progress.snapshot();
                tracing::info!(
                    files = snapshot.files_seen,
                    dirs = snapshot.dirs_seen,
                    elapsed_ms = snapshot.elapsed.as_millis() as u64,
                    "scan completed"
                );
                let _ = self.event_tx.send(ScanEvent::Completed {
                    files: snapshot.files_seen,
                    dirs: snapshot.dirs_seen,
                });
            }
            Ok(Walk::Cancelled) => {
                tracing::info!("scan cancelled");
                let _ = self.event_tx.send(ScanEvent::Cancelled);
            }
            Err(e) => {
                let message = e.to_string();
                tracing::error!(%message, "scan failed");
                let _ = self.event_tx.send(ScanEvent::Failed { message });
            }
        }
    }

    /// Emit one directory level, recursing into subdirectories. `Err` is
    /// only returned for the root level; deeper read failures degrade to
    /// warnings so siblings keep scanning.
    fn walk_dir(
        &mut self,
        dir: PathBuf,
        parent: Option<NodeId>,
        level: usize,
    ) -> Pin<Box<dyn Future<Output = std::io::Result<Walk>> + Send + '_>> {
        Box::pin(async move {
            // Batch the read_dir and per-entry stats in one blocking call.
            let listing = {
                let path = dir.clone();
                let hidden_prefix = self.settings.hidden_prefix.clone();
                tokio::task::spawn_blocking(move || read_dir_batch(&path, &hidden_prefix)).await
            };

            let entries = match listing {
                Ok(Ok(entries)) => entries,
                Ok(Err(e)) => {
                    if parent.is_none() {
                        return Err(e);
                    }
                    self.warn(dir, format!("cannot read directory: {}", e));
                    return Ok(Walk::Continue);
                }
                Err(e) => {
                    if parent.is_none() {
                        return Err(std::io::Error::other(e));
                    }
                    self.warn(dir, format!("listing task failed: {}", e));
                    return Ok(Walk::Continue);
                }
            };

            // All of a directory's entries are emitted before any
            // recursion, so siblings precede the subtrees' contents.
            let mut subdirs = Vec::new();
            for entry in entries {
                if self.cancel.load(Ordering::Relaxed) {
                    return Ok(Walk::Cancelled);
                }

                let id = NodeId(self.next_id);
                self.next_id += 1;

                let kind = entry.kind;
                let path = entry.path.clone();
                let _ = self.event_tx.send(ScanEvent::NodeDiscovered(DiscoveredNode {
                    id,
                    parent,
                    kind,
                    name: entry.name,
                    path: entry.path,
                    meta: entry.meta,
                }));
                if let Some(message) = entry.stat_error {
                    self.warn(path.clone(), message);
                }

                match kind {
                    NodeKind::Directory => self.progress.record_dir(),
                    NodeKind::File => self.progress.record_file(),
                }
                self.since_progress += 1;
                if self.since_progress >= self.settings.progress_interval {
                    self.since_progress = 0;
                    let _ = self.event_tx.send(ScanEvent::Progress {
                        summary: self.progress.snapshot().summary(),
                    });
                }

                if kind == NodeKind::Directory
                    && self.settings.max_depth.map_or(true, |max| level < max)
                {
                    subdirs.push((id, path));
                }
            }

            for (id, path) in subdirs {
                if self.cancel.load(Ordering::Relaxed) {
                    return Ok(Walk::Cancelled);
                }
                if self.walk_dir(path, Some(id), level + 1).await? == Walk::Cancelled {
                    return Ok(Walk::Cancelled);
                }
            }

            Ok(Walk::Continue)
        })
    }

    fn warn(&self, path: PathBuf, message: String) {
        tracing::warn!(path = %path.display(), %message, "scan warning");
        self.progress.record_warning();
        let _ = self.event_tx.send(ScanEvent::Warning { path, message });
    }
}

/// One listed entry with best-effort metadata. `stat_error` carries the
/// reason when the metadata could not be read; the entry is still reported.
struct RawEntry {
    path: PathBuf,
    name: String,
    kind: NodeKind,
    meta: Option<FileMeta>,
    stat_error: Option<String>,
}

/// Read a directory and stat every entry in one blocking call, skipping
/// hidden names and sorting into the emission order the store relies on:
/// directories before files, case-insensitive name ascending within each
/// group (raw name as the final tiebreak).
fn read_dir_batch(dir: &Path, hidden_prefix: &str) -> std::io::Result<Vec<RawEntry>> {
    let mut entries = Vec::new();

    for entry_result in std::fs::read_dir(dir)? {
        let entry = match entry_result {
            Ok(entry) => entry,
            // An entry that cannot even be listed has no name to report;
            // the directory-level warning path covers total failures.
            Err(_) => continue,
        };
        let name = entry.file_name().to_string_lossy().to_string();
        if !hidden_prefix.is_empty() && name.starts_with(hidden_prefix) {
            continue;
        }

        let path = entry.path();
        // Symlinks are never followed: classify by the link itself.
        match std::fs::symlink_metadata(&path) {
            Ok(meta) => {
                let kind = if meta.is_dir() {
                    NodeKind::Directory
                } else {
                    NodeKind::File
                };
                let file_meta = (kind == NodeKind::File).then(|| FileMeta {
                    size: meta.len(),
                    modified: meta.modified().ok(),
                });
                entries.push(RawEntry {
                    path,
                    name,
                    kind,
                    meta: file_meta,
                    stat_error: None,
                });
            }
            Err(e) => {
                // Fall back to the dirent's type so the entry still shows
                // up, just without size or mtime.
                let kind = match entry.file_type() {
                    Ok(ft) if ft.is_dir() => NodeKind::Directory,
                    _ => NodeKind::File,
                };
                entries.push(RawEntry {
                    path,
                    name,
                    kind,
                    meta: None,
                    stat_error: Some(format!("cannot stat entry: {}", e)),
                });
            }
        }
    }

    entries.sort_by(|a, b| {
        let a_key = (a.kind != NodeKind::Directory, a.name.to_lowercase());
        let b_key = (b.kind != NodeKind::Directory, b.name.to_lowercase());
        a_key.cmp(&b_key).then_with(|| a.name.cmp(&b.name))
    });

    Ok(entries)
}
