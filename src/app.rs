use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::bail;

use crate::config::settings::Settings;
use crate::core::dispatcher::{Dispatcher, ScanStatus};
use crate::export::archive::export_archive;
use crate::export::json::export_manifest;
use crate::models::node::{human_readable_size, CheckState};

/// Non-interactive driver: scan, select, export.
///
/// Stands in for the UI layer the core otherwise serves. The scan runs in
/// the background while the dispatcher is ticked on a fixed interval; once
/// the scan reaches a terminal state, the selection is applied and the
/// checked files are handed to the export writers.
pub struct App {
    dispatcher: Dispatcher,
    root: PathBuf,
    excludes: Vec<String>,
}

impl App {
    pub fn new(root: PathBuf, settings: Settings, excludes: Vec<String>) -> Self {
        Self {
            dispatcher: Dispatcher::new(settings),
            root,
            excludes,
        }
    }

    pub async fn run(&mut self, output: &Path, manifest: Option<&Path>) -> anyhow::Result<()> {
        self.dispatcher.start_scan(self.root.clone()).await;

        let mut tick = tokio::time::interval(Duration::from_millis(100));
        let mut last_status = String::new();
        loop {
            tick.tick().await;
            self.dispatcher.tick();
            if self.dispatcher.status_line() != last_status {
                last_status = self.dispatcher.status_line().to_string();
                tracing::info!("{}", last_status);
            }
            if self.dispatcher.status().is_terminal() {
                break;
            }
        }
        self.dispatcher.await_terminal().await;

        if self.dispatcher.status() == ScanStatus::Failed {
            bail!("{}", self.dispatcher.status_line());
        }

        self.apply_selection();

        let files = self.dispatcher.store().checked_files();
        if files.is_empty() {
            println!("No files selected; nothing to write.");
            return Ok(());
        }

        let summary = export_archive(&self.root, &files, output)?;
        println!(
            "Wrote {} of {} files to {} ({})",
            summary.written,
            files.len(),
            output.display(),
            human_readable_size(summary.output_size)
        );
        if !summary.errors.is_empty() {
            println!("{} files could not be read; see the archive footer.", summary.errors.len());
        }

        if let Some(manifest_path) = manifest {
            export_manifest(&self.root, &files, manifest_path)?;
            println!("Manifest written to {}", manifest_path.display());
        }

        Ok(())
    }

    /// Check everything, then uncheck any subtree whose name matches an
    /// exclude filter. Runs through the same toggle path a UI would use,
    /// so ancestor states stay consistent.
    fn apply_selection(&mut self) {
        let store = self.dispatcher.store_mut();
        store.check_all();

        for name in &self.excludes {
            let matching: Vec<_> = store
                .nodes()
                .filter(|n| &n.name == name)
                .map(|n| n.id)
                .collect();
            for id in matching {
                match store.get(id).map(|n| n.check) {
                    // Mixed toggles to Checked first, so a partly excluded
                    // subtree takes two toggles to fully uncheck.
                    Some(CheckState::Mixed) => {
                        let _ = store.toggle(id);
                        let _ = store.toggle(id);
                    }
                    Some(CheckState::Checked) => {
                        let _ = store.toggle(id);
                    }
                    // Already unchecked by an earlier filter, or gone.
                    _ => {}
                }
            }
        }
    }
}
