use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Counters shared between the scanner task and whoever reports status.
/// Updated with relaxed atomics; a snapshot is only ever advisory.
pub struct ProgressTracker {
    pub files_seen: AtomicUsize,
    pub dirs_seen: AtomicUsize,
    pub warnings: AtomicUsize,
    pub start_time: Instant,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            files_seen: AtomicUsize::new(0),
            dirs_seen: AtomicUsize::new(0),
            warnings: AtomicUsize::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_file(&self) {
        self.files_seen.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dir(&self) {
        self.dirs_seen.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_warning(&self) {
        self.warnings.fetch_add(1, Ordering::Relaxed);
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            files_seen: self.files_seen.load(Ordering::Relaxed),
            dirs_seen: self.dirs_seen.load(Ordering::Relaxed),
            warnings: self.warnings.load(Ordering::Relaxed),
            elapsed: self.elapsed(),
        }
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ProgressSnapshot {
    pub files_seen: usize,
    pub dirs_seen: usize,
    pub warnings: usize,
    pub elapsed: Duration,
}

impl ProgressSnapshot {
    pub fn summary(&self) -> String {
        format!(
            "Discovered {} files in {} folders",
            self.files_seen, self.dirs_seen
        )
    }
}
