//! # In-Memory Path Tree
//!
//! A rooted tree built by inserting path entries in any order. Nodes are
//! arena-allocated and linked through first-child / next-sibling indices, so
//! there are no back-pointers and no cycles by construction. The sibling
//! chain is unordered in memory; display and signature hashing sort siblings
//! by name.

use std::io::Write;

use crate::common::AjfsResult;
use crate::path_entry::PathEntry;

/// Index of a node inside its arena.
pub type NodeId = usize;

/// One tree node: a path component name, the entry recorded for the path (if
/// any), and links into the arena.
#[derive(Debug)]
pub struct TreeNode {
    pub name: String,
    /// Full relative path of this node (`.` for the root).
    pub path: String,
    pub entry: Option<PathEntry>,
    pub first_child: Option<NodeId>,
    pub next_sibling: Option<NodeId>,
}

/// Arena-allocated path tree. Node 0 is always the root (`.`).
#[derive(Debug)]
pub struct PathTree {
    nodes: Vec<TreeNode>,
}

impl PathTree {
    pub fn new() -> Self {
        Self {
            nodes: vec![TreeNode {
                name: ".".to_string(),
                path: ".".to_string(),
                entry: None,
                first_child: None,
                next_sibling: None,
            }],
        }
    }

    pub const ROOT: NodeId = 0;

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1 && self.nodes[0].first_child.is_none()
    }

    pub fn node(&self, id: NodeId) -> &TreeNode {
        &self.nodes[id]
    }

    /// Inserts an entry, creating intermediate nodes as needed. Inserting
    /// `.` attaches the entry to the root node.
    pub fn insert(&mut self, entry: PathEntry) {
        if entry.path == "." {
            self.nodes[Self::ROOT].entry = Some(entry);
            return;
        }
        let mut current = Self::ROOT;
        let path = entry.path.clone();
        for name in path.split('/') {
            current = match self.child_named(current, name) {
                Some(child) => child,
                None => self.add_child(current, name),
            };
        }
        self.nodes[current].entry = Some(entry);
    }

    fn child_named(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        let mut next = self.nodes[parent].first_child;
        while let Some(child) = next {
            if self.nodes[child].name == name {
                return Some(child);
            }
            next = self.nodes[child].next_sibling;
        }
        None
    }

    fn add_child(&mut self, parent: NodeId, name: &str) -> NodeId {
        let path = if parent == Self::ROOT {
            name.to_string()
        } else {
            format!("{}/{name}", self.nodes[parent].path)
        };
        // New children are pushed to the front of the sibling chain.
        let id = self.nodes.len();
        let previous_first = self.nodes[parent].first_child;
        self.nodes.push(TreeNode {
            name: name.to_string(),
            path,
            entry: None,
            first_child: None,
            next_sibling: previous_first,
        });
        self.nodes[parent].first_child = Some(id);
        id
    }

    /// Children of `parent`, sorted by name.
    pub fn sorted_children(&self, parent: NodeId) -> Vec<NodeId> {
        let mut children = Vec::new();
        let mut next = self.nodes[parent].first_child;
        while let Some(child) = next {
            children.push(child);
            next = self.nodes[child].next_sibling;
        }
        children.sort_by(|a, b| self.nodes[*a].name.cmp(&self.nodes[*b].name));
        children
    }

    /// Resolves a relative path (`a/b/c`, or `.` for the root) to a node.
    pub fn find(&self, path: &str) -> Option<NodeId> {
        if path == "." || path.is_empty() {
            return Some(Self::ROOT);
        }
        let mut current = Self::ROOT;
        for name in path.split('/') {
            current = self.child_named(current, name)?;
        }
        Some(current)
    }

    /// Prints the subtree below `start` with two-space indentation, siblings
    /// sorted by name. `dirs_only` limits output to directories.
    pub fn write_tree<W: Write + ?Sized>(
        &self,
        out: &mut W,
        start: NodeId,
        dirs_only: bool,
    ) -> AjfsResult<()> {
        writeln!(out, "{}", self.nodes[start].name)?;
        self.write_children(out, start, 1, dirs_only)?;
        Ok(())
    }

    fn write_children<W: Write + ?Sized>(
        &self,
        out: &mut W,
        parent: NodeId,
        depth: usize,
        dirs_only: bool,
    ) -> AjfsResult<()> {
        for child in self.sorted_children(parent) {
            let node = &self.nodes[child];
            let is_dir = node.first_child.is_some()
                || node.entry.as_ref().is_some_and(|e| e.is_directory());
            if dirs_only && !is_dir {
                continue;
            }
            writeln!(out, "{}{}", "  ".repeat(depth), node.name)?;
            self.write_children(out, child, depth + 1, dirs_only)?;
        }
        Ok(())
    }
}

impl Default for PathTree {
    fn default() -> Self {
        Self::new()
    }
}
