use std::path::PathBuf;

use thiserror::Error;

use super::node::{CheckState, FileMeta, Node, NodeId, NodeKind, SelectedFile};

#[derive(Debug, Error)]
pub enum TreeError {
    #[error("unknown node id {0}")]
    UnknownNode(NodeId),
    #[error("node {id} inserted out of order (next expected id is #{expected})")]
    OutOfOrderInsert { id: NodeId, expected: u64 },
}

/// Description of a discovered entry, as carried by a scan event. The store
/// turns this into an owned `Node`; the scanner itself never holds nodes.
#[derive(Debug, Clone)]
pub struct DiscoveredNode {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    pub kind: NodeKind,
    pub name: String,
    pub path: PathBuf,
    pub meta: Option<FileMeta>,
}

/// Arena of nodes for one scan, indexed by `NodeId`.
///
/// Parent/child links are plain ids, never owning pointers, so the whole
/// tree is cleared in one call before each scan. Only the dispatcher
/// mutates the store; everything here is synchronous single-owner code.
#[derive(Debug, Default)]
pub struct TreeStore {
    nodes: Vec<Node>,
    roots: Vec<NodeId>,
}

impl TreeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.roots.clear();
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    pub fn file_count(&self) -> usize {
        self.nodes.iter().filter(|n| !n.is_dir()).count()
    }

    pub fn dir_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_dir()).count()
    }

    /// Insert a discovered entry. Ids must arrive as a dense sequence and a
    /// parent must already be present, both guaranteed by the scanner's
    /// pre-order emission; a violation is a programming error.
    pub fn insert(&mut self, discovered: DiscoveredNode) -> Result<NodeId, TreeError> {
        let id = discovered.id;
        let expected = self.nodes.len() as u64;
        if id.0 != expected {
            return Err(TreeError::OutOfOrderInsert { id, expected });
        }

        match discovered.parent {
            Some(parent_id) => {
                let parent = self
                    .nodes
                    .get_mut(parent_id.index())
                    .ok_or(TreeError::UnknownNode(parent_id))?;
                parent.children.push(id);
            }
            None => self.roots.push(id),
        }

        self.nodes.push(Node {
            id,
            parent: discovered.parent,
            children: Vec::new(),
            kind: discovered.kind,
            name: discovered.name,
            path: discovered.path,
            meta: discovered.meta,
            check: CheckState::Unchecked,
        });
        Ok(id)
    }

    /// Flip a node's check state and propagate: the whole subtree takes the
    /// new state, then every ancestor is recomputed from its children.
    /// A `Mixed` node toggles to `Checked`. Returns the state the target
    /// node ended up in.
    pub fn toggle(&mut self, id: NodeId) -> Result<CheckState, TreeError> {
        let node = self
            .nodes
            .get(id.index())
            .ok_or(TreeError::UnknownNode(id))?;
        let desired = match node.check {
            CheckState::Checked => CheckState::Unchecked,
            CheckState::Unchecked | CheckState::Mixed => CheckState::Checked,
        };

        // Downward: flood the subtree with the explicit state.
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let node = &mut self.nodes[current.index()];
            node.check = desired;
            stack.extend(node.children.iter().copied());
        }

        // Upward: recompute each ancestor from its children. Stopping once
        // an ancestor's state is unchanged is safe because states further up
        // derive only from it.
        let mut parent = self.nodes[id.index()].parent;
        while let Some(ancestor_id) = parent {
            let derived = self.derived_state(ancestor_id);
            let ancestor = &mut self.nodes[ancestor_id.index()];
            if ancestor.check == derived {
                break;
            }
            ancestor.check = derived;
            parent = ancestor.parent;
        }

        Ok(desired)
    }

    pub fn check_all(&mut self) {
        for node in &mut self.nodes {
            node.check = CheckState::Checked;
        }
    }

    pub fn uncheck_all(&mut self) {
        for node in &mut self.nodes {
            node.check = CheckState::Unchecked;
        }
    }

    /// All checked file leaves in pre-order tree order. Directories are
    /// never part of the selection themselves.
    pub fn checked_files(&self) -> Vec<SelectedFile> {
        let mut selected = Vec::new();
        let mut stack: Vec<NodeId> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id.index()];
            if !node.is_dir() && node.check == CheckState::Checked {
                selected.push(SelectedFile {
                    path: node.path.clone(),
                    name: node.name.clone(),
                    size: node.size(),
                    modified: node.meta.and_then(|m| m.modified),
                });
            }
            stack.extend(node.children.iter().rev().copied());
        }
        selected
    }

    /// What a node's state should be, derived from its children. Childless
    /// nodes keep their explicit state.
    fn derived_state(&self, id: NodeId) -> CheckState {
        let node = &self.nodes[id.index()];
        if node.children.is_empty() {
            return node.check;
        }
        let mut all_checked = true;
        let mut all_unchecked = true;
        for child in &node.children {
            match self.nodes[child.index()].check {
                CheckState::Checked => all_unchecked = false,
                CheckState::Unchecked => all_checked = false,
                CheckState::Mixed => {
                    all_checked = false;
                    all_unchecked = false;
                }
            }
        }
        if all_checked {
            CheckState::Checked
        } else if all_unchecked {
            CheckState::Unchecked
        } else {
            CheckState::Mixed
        }
    }

    /// Every non-leaf node's state matches the derived function of its
    /// children. Used by tests and debug assertions.
    pub fn is_consistent(&self) -> bool {
        self.nodes
            .iter()
            .all(|n| n.children.is_empty() || n.check == self.derived_state(n.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(id: u64, parent: Option<u64>, name: &str) -> DiscoveredNode {
        DiscoveredNode {
            id: NodeId(id),
            parent: parent.map(NodeId),
            kind: NodeKind::File,
            name: name.to_string(),
            path: PathBuf::from(format!("/root/{}", name)),
            meta: Some(FileMeta {
                size: 100,
                modified: None,
            }),
        }
    }

    fn dir(id: u64, parent: Option<u64>, name: &str) -> DiscoveredNode {
        DiscoveredNode {
            id: NodeId(id),
            parent: parent.map(NodeId),
            kind: NodeKind::Directory,
            name: name.to_string(),
            path: PathBuf::from(format!("/root/{}", name)),
            meta: None,
        }
    }

    /// root layout:
    ///   src/        (0)
    ///     util.py   (1)
    ///   main.py     (2)
    ///   readme.md   (3)
    fn small_tree() -> TreeStore {
        let mut store = TreeStore::new();
        store.insert(dir(0, None, "src")).unwrap();
        store.insert(file(1, Some(0), "util.py")).unwrap();
        store.insert(file(2, None, "main.py")).unwrap();
        store.insert(file(3, None, "readme.md")).unwrap();
        store
    }

    #[test]
    fn insert_links_parent_and_roots() {
        let store = small_tree();
        assert_eq!(store.len(), 4);
        assert_eq!(store.roots(), &[NodeId(0), NodeId(2), NodeId(3)]);
        assert_eq!(store.get(NodeId(0)).unwrap().children, vec![NodeId(1)]);
        assert_eq!(store.get(NodeId(1)).unwrap().parent, Some(NodeId(0)));
        assert_eq!(store.file_count(), 3);
        assert_eq!(store.dir_count(), 1);
    }

    #[test]
    fn insert_rejects_sparse_ids_and_missing_parents() {
        let mut store = TreeStore::new();
        assert!(matches!(
            store.insert(file(5, None, "late.txt")),
            Err(TreeError::OutOfOrderInsert { .. })
        ));
        assert!(matches!(
            store.insert(file(0, Some(7), "orphan.txt")),
            Err(TreeError::UnknownNode(NodeId(7)))
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn toggle_directory_floods_subtree() {
        // Checking `src` checks `util.py`; unchecking `util.py` pulls
        // `src` back to Unchecked since it is the only child.
        let mut store = small_tree();
        assert_eq!(store.toggle(NodeId(0)).unwrap(), CheckState::Checked);
        assert_eq!(store.get(NodeId(1)).unwrap().check, CheckState::Checked);

        assert_eq!(store.toggle(NodeId(1)).unwrap(), CheckState::Unchecked);
        assert_eq!(store.get(NodeId(0)).unwrap().check, CheckState::Unchecked);
        assert!(store.is_consistent());
    }

    #[test]
    fn partial_selection_is_mixed() {
        // d/ with two checked files and one unchecked: d is Mixed and only
        // the two checked files are in the selection.
        let mut store = TreeStore::new();
        store.insert(dir(0, None, "d")).unwrap();
        store.insert(file(1, Some(0), "a.txt")).unwrap();
        store.insert(file(2, Some(0), "b.txt")).unwrap();
        store.insert(file(3, Some(0), "c.txt")).unwrap();

        store.toggle(NodeId(1)).unwrap();
        store.toggle(NodeId(2)).unwrap();

        assert_eq!(store.get(NodeId(0)).unwrap().check, CheckState::Mixed);
        let selected = store.checked_files();
        assert_eq!(selected.len(), 2);
        assert_eq!(selected[0].name, "a.txt");
        assert_eq!(selected[1].name, "b.txt");
        assert!(store.is_consistent());
    }

    #[test]
    fn mixed_toggles_to_checked() {
        let mut store = TreeStore::new();
        store.insert(dir(0, None, "d")).unwrap();
        store.insert(file(1, Some(0), "a.txt")).unwrap();
        store.insert(file(2, Some(0), "b.txt")).unwrap();

        store.toggle(NodeId(1)).unwrap();
        assert_eq!(store.get(NodeId(0)).unwrap().check, CheckState::Mixed);

        assert_eq!(store.toggle(NodeId(0)).unwrap(), CheckState::Checked);
        assert_eq!(store.get(NodeId(1)).unwrap().check, CheckState::Checked);
        assert_eq!(store.get(NodeId(2)).unwrap().check, CheckState::Checked);
    }

    #[test]
    fn toggle_twice_restores_ancestors() {
        let mut store = TreeStore::new();
        store.insert(dir(0, None, "outer")).unwrap();
        store.insert(dir(1, Some(0), "inner")).unwrap();
        store.insert(file(2, Some(1), "a.txt")).unwrap();
        store.insert(file(3, Some(1), "b.txt")).unwrap();

        store.toggle(NodeId(2)).unwrap();
        let before: Vec<CheckState> = (0..4).map(|i| store.get(NodeId(i)).unwrap().check).collect();

        store.toggle(NodeId(3)).unwrap();
        store.toggle(NodeId(3)).unwrap();

        let after: Vec<CheckState> = (0..4).map(|i| store.get(NodeId(i)).unwrap().check).collect();
        assert_eq!(before, after);
        assert!(store.is_consistent());
    }

    #[test]
    fn deep_chain_propagates_to_root() {
        let mut store = TreeStore::new();
        store.insert(dir(0, None, "a")).unwrap();
        store.insert(dir(1, Some(0), "b")).unwrap();
        store.insert(dir(2, Some(1), "c")).unwrap();
        store.insert(file(3, Some(2), "leaf.txt")).unwrap();

        store.toggle(NodeId(3)).unwrap();
        for i in 0..3 {
            assert_eq!(store.get(NodeId(i)).unwrap().check, CheckState::Checked);
        }

        store.toggle(NodeId(3)).unwrap();
        for i in 0..3 {
            assert_eq!(store.get(NodeId(i)).unwrap().check, CheckState::Unchecked);
        }
    }

    #[test]
    fn toggle_unknown_id_is_an_error_and_leaves_state_alone() {
        let mut store = small_tree();
        store.toggle(NodeId(0)).unwrap();
        assert!(matches!(
            store.toggle(NodeId(99)),
            Err(TreeError::UnknownNode(NodeId(99)))
        ));
        assert_eq!(store.get(NodeId(0)).unwrap().check, CheckState::Checked);
        assert!(store.is_consistent());
    }

    #[test]
    fn check_all_and_uncheck_all() {
        let mut store = small_tree();
        store.check_all();
        assert!(store.is_consistent());
        assert_eq!(store.checked_files().len(), 3);

        store.uncheck_all();
        assert!(store.is_consistent());
        assert!(store.checked_files().is_empty());
    }

    #[test]
    fn checked_files_come_out_in_tree_order() {
        let mut store = small_tree();
        store.check_all();
        let selected = store.checked_files();
        let names: Vec<&str> = selected.iter().map(|f| f.name.as_str()).collect();
        // Pre-order: src's subtree first, then the root-level files.
        assert_eq!(names, vec!["util.py", "main.py", "readme.md"]);
    }

    #[test]
    fn clear_empties_everything() {
        let mut store = small_tree();
        store.clear();
        assert!(store.is_empty());
        assert!(store.roots().is_empty());
        // Ids restart from zero after a clear.
        store.insert(file(0, None, "fresh.txt")).unwrap();
        assert_eq!(store.len(), 1);
    }
}
