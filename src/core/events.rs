use std::path::PathBuf;
use tokio::sync::mpsc;

use crate::models::tree::DiscoveredNode;

/// Messages the scanner task sends to the dispatcher. Per-scan FIFO order is
/// the channel's guarantee; exactly one of `Completed`, `Cancelled` or
/// `Failed` terminates each scan.
#[derive(Debug, Clone)]
pub enum ScanEvent {
    /// A filesystem entry, emitted in strict pre-order: a parent always
    /// precedes all of its children.
    NodeDiscovered(DiscoveredNode),

    /// Periodic human-readable count summary. Best-effort instrumentation.
    Progress { summary: String },

    /// A recoverable per-entry failure; scanning continues with siblings.
    Warning { path: PathBuf, message: String },

    // Terminal events
    Completed { files: usize, dirs: usize },
    Cancelled,
    Failed { message: String },
}

pub type EventSender = mpsc::UnboundedSender<ScanEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<ScanEvent>;

pub fn create_event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}
