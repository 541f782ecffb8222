use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::error::TryRecvError;
use tokio::task::JoinHandle;

use crate::config::settings::Settings;
use crate::models::tree::TreeStore;

use super::events::{self, EventReceiver, ScanEvent};
use super::progress::{ProgressSnapshot, ProgressTracker};
use super::scanner::Scanner;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStatus {
    Idle,
    Scanning,
    Completed,
    Cancelled,
    Failed,
}

impl ScanStatus {
    /// User controls (toggling, exporting, starting another scan) are only
    /// enabled outside of an active scan.
    pub fn is_terminal(self) -> bool {
        !matches!(self, ScanStatus::Scanning)
    }
}

struct ActiveScan {
    cancel: Arc<AtomicBool>,
    task: JoinHandle<()>,
    progress: Arc<ProgressTracker>,
}

/// Single consumer of scan events and sole owner of the tree store.
///
/// Events are applied on a tick: each call to [`tick`] drains whatever is
/// pending and returns. The scanner never touches the store; everything it
/// found arrives here as messages, in emission order, which is what makes
/// the store's no-orphan invariant hold without locks.
///
/// [`tick`]: Dispatcher::tick
pub struct Dispatcher {
    settings: Settings,
    store: TreeStore,
    status: ScanStatus,
    status_line: String,
    event_rx: Option<EventReceiver>,
    active: Option<ActiveScan>,
}

impl Dispatcher {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            store: TreeStore::new(),
            status: ScanStatus::Idle,
            status_line: "Ready".to_string(),
            event_rx: None,
            active: None,
        }
    }

    pub fn status(&self) -> ScanStatus {
        self.status
    }

    pub fn status_line(&self) -> &str {
        &self.status_line
    }

    pub fn store(&self) -> &TreeStore {
        &self.store
    }

    /// Selection operations go straight to the store; they are only
    /// meaningful once the scan has reached a terminal state.
    pub fn store_mut(&mut self) -> &mut TreeStore {
        &mut self.store
    }

    pub fn progress_snapshot(&self) -> Option<ProgressSnapshot> {
        self.active.as_ref().map(|a| a.progress.snapshot())
    }

    /// Start scanning `root`. An in-flight scan is cancelled and its
    /// terminal event awaited first, so the store is never rebuilt while a
    /// previous scanner can still emit into it. The store is cleared
    /// wholesale; ids from earlier scans become meaningless.
    pub async fn start_scan(&mut self, root: PathBuf) {
        if self.status == ScanStatus::Scanning {
            self.cancel_scan();
            self.await_terminal().await;
        }
        self.reap_task().await;

        self.store.clear();
        let (event_tx, event_rx) = events::create_event_channel();
        let cancel = Arc::new(AtomicBool::new(false));
        let progress = Arc::new(ProgressTracker::new());
        let scanner = Scanner::new(
            self.settings.clone(),
            event_tx,
            Arc::clone(&cancel),
            Arc::clone(&progress),
        );
        let task = tokio::spawn(scanner.scan(root.clone()));

        self.event_rx = Some(event_rx);
        self.active = Some(ActiveScan {
            cancel,
            task,
            progress,
        });
        self.status = ScanStatus::Scanning;
        self.status_line = format!("Scanning {}...", root.display());
    }

    /// Request cancellation of the in-flight scan. Cooperative and
    /// idempotent; the scanner acknowledges with a `Cancelled` event.
    pub fn cancel_scan(&mut self) {
        if let Some(active) = &self.active {
            active.cancel.store(true, Ordering::Relaxed);
        }
    }

    /// Drain everything currently pending and apply it in arrival order.
    /// Never blocks. Returns the number of events applied.
    pub fn tick(&mut self) -> usize {
        // The receiver is taken for the duration of the drain so events can
        // be applied against `self` without aliasing it.
        let Some(mut rx) = self.event_rx.take() else {
            return 0;
        };
        let mut applied = 0;
        loop {
            match rx.try_recv() {
                Ok(event) => {
                    applied += 1;
                    self.apply(event);
                }
                Err(TryRecvError::Empty) => {
                    self.event_rx = Some(rx);
                    break;
                }
                Err(TryRecvError::Disconnected) => {
                    // The scanner is gone. If it never sent a terminal
                    // event the task died; surface that as a failure.
                    if self.status == ScanStatus::Scanning {
                        tracing::error!("scan task ended without a terminal event");
                        self.status = ScanStatus::Failed;
                        self.status_line = "Scan failed: scanner stopped unexpectedly".to_string();
                    }
                    break;
                }
            }
        }
        applied
    }

    /// Poll ticks until the current scan reaches a terminal status, then
    /// reap the scanner task.
    pub async fn await_terminal(&mut self) {
        while self.status == ScanStatus::Scanning {
            if self.tick() == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        }
        self.reap_task().await;
    }

    fn apply(&mut self, event: ScanEvent) {
        match event {
            ScanEvent::NodeDiscovered(discovered) => {
                if self.status != ScanStatus::Scanning {
                    // A cancelled scanner may have queued a few entries
                    // past its terminal event's enqueue point; drop them.
                    tracing::debug!(id = %discovered.id, "dropping event after terminal state");
                    return;
                }
                if let Err(e) = self.store.insert(discovered) {
                    // Pre-order emission makes this unreachable; treat a
                    // breach as a bug, loudly in debug builds.
                    debug_assert!(false, "tree insert failed: {e}");
                    tracing::error!(error = %e, "dropping out-of-order scan event");
                }
            }
            ScanEvent::Progress { summary } => {
                if self.status == ScanStatus::Scanning {
                    self.status_line = summary;
                }
            }
            ScanEvent::Warning { path, message } => {
                tracing::debug!(path = %path.display(), %message, "scan warning observed");
            }
            // Terminal events carry the same guard as discovery: only the
            // first one recorded for a scan counts.
            ScanEvent::Completed { .. } | ScanEvent::Cancelled | ScanEvent::Failed { .. }
                if self.status != ScanStatus::Scanning =>
            {
                tracing::debug!("dropping duplicate terminal event");
            }
            ScanEvent::Completed { files, dirs } => {
                self.status = ScanStatus::Completed;
                self.status_line = format!("Loaded {} files in {} folders", files, dirs);
            }
            ScanEvent::Cancelled => {
                self.status = ScanStatus::Cancelled;
                self.status_line = format!(
                    "Scan cancelled; keeping {} entries already discovered",
                    self.store.len()
                );
            }
            ScanEvent::Failed { message } => {
                self.status = ScanStatus::Failed;
                self.status_line = format!("Scan failed: {}", message);
            }
        }
    }

    async fn reap_task(&mut self) {
        if let Some(active) = self.active.take() {
            if let Err(e) = active.task.await {
                tracing::error!(error = %e, "scan task panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_terminal_event_wins() {
        let mut dispatcher = Dispatcher::new(Settings::default());
        dispatcher.status = ScanStatus::Scanning;

        dispatcher.apply(ScanEvent::Completed { files: 3, dirs: 1 });
        assert_eq!(dispatcher.status, ScanStatus::Completed);

        // Stray terminals queued behind the first one are dropped.
        dispatcher.apply(ScanEvent::Failed {
            message: "late".to_string(),
        });
        dispatcher.apply(ScanEvent::Cancelled);
        assert_eq!(dispatcher.status, ScanStatus::Completed);
        assert_eq!(dispatcher.status_line, "Loaded 3 files in 1 folders");
    }

    #[test]
    fn progress_after_terminal_leaves_status_line_alone() {
        let mut dispatcher = Dispatcher::new(Settings::default());
        dispatcher.status = ScanStatus::Scanning;
        dispatcher.apply(ScanEvent::Cancelled);

        let line = dispatcher.status_line.clone();
        dispatcher.apply(ScanEvent::Progress {
            summary: "Discovered 99 files in 9 folders".to_string(),
        });
        assert_eq!(dispatcher.status_line, line);
    }
}
