use std::path::PathBuf;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// Identifier of a node within one scan's tree.
///
/// Ids are assigned by the scanner as a dense sequence in discovery order,
/// so an id doubles as the node's index in the tree store arena. Ids are
/// only meaningful for the lifetime of a single scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    Directory,
    File,
}

/// Selection state of a node. `Mixed` only ever appears on nodes with
/// children: some but not all of the subtree is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckState {
    Unchecked,
    Checked,
    Mixed,
}

/// Best-effort file metadata. A stat failure during the scan leaves the
/// node without metadata rather than aborting anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMeta {
    pub size: u64,
    pub modified: Option<SystemTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    /// Child ids in discovery order. The scanner's ordering contract
    /// (directories first, case-insensitive name within each group) makes
    /// this deterministic for a given filesystem snapshot.
    pub children: Vec<NodeId>,
    pub kind: NodeKind,
    pub name: String,
    pub path: PathBuf,
    pub meta: Option<FileMeta>,
    pub check: CheckState,
}

impl Node {
    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Directory
    }

    pub fn size(&self) -> u64 {
        self.meta.map(|m| m.size).unwrap_or(0)
    }

    pub fn human_readable_size(&self) -> String {
        human_readable_size(self.size())
    }
}

/// A checked file leaf as handed to the export writers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectedFile {
    pub path: PathBuf,
    pub name: String,
    pub size: u64,
    pub modified: Option<SystemTime>,
}

pub fn human_readable_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * KB;
    const GB: u64 = 1024 * MB;
    const TB: u64 = 1024 * GB;

    if bytes >= TB {
        format!("{:.2} TB", bytes as f64 / TB as f64)
    } else if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
