//! Driver for `dupes`: file-level duplicate groups from the hash table, or
//! subtree-level groups from the signatured tree with `--dirs`.

use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;

use crate::common::{AjfsError, AjfsResult, Visit};
use crate::database::DatabaseFile;
use crate::path_entry::{PathEntry, PathId};
use crate::sig_tree::SignaturedTree;
use crate::tree::{NodeId, PathTree};

use super::CommonConfig;

#[derive(Debug)]
pub struct DupesArgs {
    pub db: PathBuf,
    pub dirs: bool,
    pub show_tree: bool,
}

pub fn dupes(args: &DupesArgs, config: &CommonConfig, out: &mut dyn Write) -> AjfsResult<()> {
    if args.dirs {
        subtree_dupes(args, config, out)
    } else {
        file_dupes(args, out)
    }
}

/// Prints duplicate-file groups in deterministic order (hex digest
/// ascending, entry index within a group).
fn file_dupes(args: &DupesArgs, out: &mut dyn Write) -> AjfsResult<()> {
    let mut db = DatabaseFile::open(&args.db)?;
    if !db.has_hash_table() {
        return Err(AjfsError::InvalidFormat(
            "duplicate detection needs a hash table; re-scan with --hash".into(),
        ));
    }
    let mut groups: Vec<(String, Vec<PathEntry>)> = Vec::new();
    db.find_duplicates(|group, _, entry, digest_hex| {
        if groups.len() <= group as usize {
            groups.push((digest_hex.to_string(), Vec::new()));
        }
        groups[group as usize].1.push(entry);
        Ok(Visit::Continue)
    })?;
    db.close()?;

    for (number, (digest_hex, entries)) in groups.iter().enumerate() {
        let total: u64 = entries.iter().map(|e| e.size).sum();
        writeln!(
            out,
            "group {} {digest_hex} count {} size {total}",
            number + 1,
            entries.len()
        )?;
        for entry in entries {
            writeln!(out, "  {}", entry.path)?;
        }
    }
    if groups.is_empty() {
        writeln!(out, "no duplicate files")?;
    }
    Ok(())
}

/// Prints duplicate-subtree groups: directories whose name hierarchies (and
/// file contents, when hashed) carry the same recursive signature.
fn subtree_dupes(args: &DupesArgs, _config: &CommonConfig, out: &mut dyn Write) -> AjfsResult<()> {
    let mut db = DatabaseFile::open(&args.db)?;
    let mut tree = PathTree::new();
    db.read_all_entries(|_, entry| {
        tree.insert(entry);
        Ok(Visit::Continue)
    })?;
    let content_hashes: HashMap<PathId, Vec<u8>> = if db.has_hash_table() {
        let by_index = db.read_hash_table()?;
        let mut by_id = HashMap::with_capacity(by_index.len());
        for (index, digest) in by_index {
            let entry = db.read_entry_at(index)?;
            by_id.insert(entry.id, digest);
        }
        by_id
    } else {
        HashMap::new()
    };
    db.close()?;

    let signatured = SignaturedTree::build(&tree, &content_hashes);
    if args.show_tree {
        write_signatured_tree(&signatured, PathTree::ROOT, 0, out)?;
        return Ok(());
    }

    let groups = signatured.duplicate_groups();
    for (signature, nodes) in &groups {
        let paths: Vec<&str> = nodes
            .iter()
            .map(|node| tree.node(*node).path.as_str())
            .collect();
        writeln!(out, "signature {} ({} directories)", hex::encode(signature), paths.len())?;
        for path in paths {
            writeln!(out, "  {path}")?;
        }
    }
    if groups.is_empty() {
        writeln!(out, "no duplicate directories")?;
    }
    Ok(())
}

fn write_signatured_tree(
    signatured: &SignaturedTree,
    node: NodeId,
    depth: usize,
    out: &mut dyn Write,
) -> AjfsResult<()> {
    let tree = signatured.tree();
    writeln!(
        out,
        "{}{} {}",
        "  ".repeat(depth),
        signatured.signature_hex(node),
        tree.node(node).name
    )?;
    for child in tree.sorted_children(node) {
        write_signatured_tree(signatured, child, depth + 1, out)?;
    }
    Ok(())
}
