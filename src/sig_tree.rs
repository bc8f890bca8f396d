//! # Signatured Tree
//!
//! An overlay over the in-memory path tree assigning each node a 20-byte
//! recursive signature: the SHA-1 of the node's child signatures (sorted by
//! child name) followed by the node's own name bytes. Leaves mix in their
//! file-content digest when one is available, and fall back to the name
//! alone otherwise.
//!
//! Equal signatures imply structurally equal subtrees (by name hierarchy),
//! which is the basis for subtree-level duplicate detection: two
//! independently rooted directories containing the same child-name hierarchy
//! produce the same signature.

use std::collections::HashMap;

use sha1::{Digest, Sha1};

use crate::path_entry::PathId;
use crate::tree::{NodeId, PathTree};

/// Size in bytes of a node signature.
pub const SIGNATURE_LEN: usize = 20;

pub type Signature = [u8; SIGNATURE_LEN];

/// Parallel overlay borrowing the underlying tree: one signature per node.
#[derive(Debug)]
pub struct SignaturedTree<'a> {
    tree: &'a PathTree,
    signatures: Vec<Signature>,
}

impl<'a> SignaturedTree<'a> {
    /// Computes all signatures bottom-up. `content_hashes` maps a path
    /// identifier to that file's content digest; pass an empty map when the
    /// database carries no hash table.
    pub fn build(tree: &'a PathTree, content_hashes: &HashMap<PathId, Vec<u8>>) -> Self {
        let mut signatures = vec![[0u8; SIGNATURE_LEN]; tree.len()];
        Self::compute(tree, content_hashes, PathTree::ROOT, &mut signatures);
        Self { tree, signatures }
    }

    fn compute(
        tree: &PathTree,
        content_hashes: &HashMap<PathId, Vec<u8>>,
        node: NodeId,
        signatures: &mut Vec<Signature>,
    ) {
        let mut hasher = Sha1::new();
        for child in tree.sorted_children(node) {
            Self::compute(tree, content_hashes, child, signatures);
            hasher.update(signatures[child]);
        }
        if tree.node(node).first_child.is_none() {
            if let Some(entry) = &tree.node(node).entry {
                if let Some(digest) = content_hashes.get(&entry.id) {
                    hasher.update(digest);
                }
            }
        }
        hasher.update(tree.node(node).name.as_bytes());
        signatures[node] = hasher.finalize().into();
    }

    pub fn tree(&self) -> &PathTree {
        self.tree
    }

    pub fn signature(&self, node: NodeId) -> &Signature {
        &self.signatures[node]
    }

    pub fn signature_hex(&self, node: NodeId) -> String {
        hex::encode(self.signatures[node])
    }

    /// Groups directory nodes by signature and keeps signatures shared by at
    /// least two nodes. Groups come back sorted by hex signature ascending,
    /// node paths sorted within each group, so enumeration is deterministic.
    pub fn duplicate_groups(&self) -> Vec<(Signature, Vec<NodeId>)> {
        let mut by_signature: HashMap<Signature, Vec<NodeId>> = HashMap::new();
        for node in 0..self.tree.len() {
            if !self.is_directory_node(node) {
                continue;
            }
            by_signature
                .entry(self.signatures[node])
                .or_default()
                .push(node);
        }
        let mut groups: Vec<(Signature, Vec<NodeId>)> = by_signature
            .into_iter()
            .filter(|(_, nodes)| nodes.len() > 1)
            .collect();
        for (_, nodes) in &mut groups {
            nodes.sort_by(|a, b| self.tree.node(*a).path.cmp(&self.tree.node(*b).path));
        }
        groups.sort_by(|a, b| a.0.cmp(&b.0));
        groups
    }

    fn is_directory_node(&self, node: NodeId) -> bool {
        if node == PathTree::ROOT {
            return true;
        }
        let tree_node = self.tree.node(node);
        tree_node.first_child.is_some()
            || tree_node.entry.as_ref().is_some_and(|e| e.is_directory())
    }
}
