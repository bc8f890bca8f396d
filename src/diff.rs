//! # Diff Engine
//!
//! Set-difference of two snapshot databases by path identifier, with
//! per-entry metadata and content-hash comparison. Every entry falls into
//! one of four categories: present only on the left, present only on the
//! right, present on both sides but changed, or unchanged.
//!
//! Content hashes take part in the comparison only when both databases carry
//! a hash table built with the same algorithm; differing algorithms silently
//! skip the hash comparison (the `tosync --hash` specialization is stricter
//! and errors instead).

use std::collections::HashMap;

use crate::common::{AjfsError, AjfsResult, Visit};
use crate::database::DatabaseFile;
use crate::path_entry::{PathEntry, PathId};

pub const CHANGED_MODE: u32 = 1;
pub const CHANGED_SIZE: u32 = 1 << 1;
pub const CHANGED_MTIME: u32 = 1 << 2;
pub const CHANGED_HASH: u32 = 1 << 3;

/// Bitmask describing which attributes of a common entry differ.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct ChangedFlags(pub u32);

impl ChangedFlags {
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn mode(&self) -> bool {
        self.0 & CHANGED_MODE > 0
    }

    pub fn size(&self) -> bool {
        self.0 & CHANGED_SIZE > 0
    }

    pub fn mtime(&self) -> bool {
        self.0 & CHANGED_MTIME > 0
    }

    pub fn hash(&self) -> bool {
        self.0 & CHANGED_HASH > 0
    }

    /// True when permission and time drift are the only differences; these
    /// are ignored for transfer planning.
    pub fn only_mode_or_mtime(&self) -> bool {
        !self.is_empty() && self.0 & (CHANGED_SIZE | CHANGED_HASH) == 0
    }

    /// Four-character rendering: one position each for mode, size, mtime and
    /// hash (`m`, `s`, `l`, `x`), `~` where unchanged.
    pub fn symbol(&self) -> String {
        let mut out = String::with_capacity(4);
        out.push(if self.mode() { 'm' } else { '~' });
        out.push(if self.size() { 's' } else { '~' });
        out.push(if self.mtime() { 'l' } else { '~' });
        out.push(if self.hash() { 'x' } else { '~' });
        out
    }
}

/// One comparison outcome handed to the diff visitor.
#[derive(Debug, Clone)]
pub enum Diff {
    LeftOnly(PathEntry),
    RightOnly(PathEntry),
    Changed(PathEntry, ChangedFlags),
    Nothing(PathEntry),
}

impl Diff {
    pub fn entry(&self) -> &PathEntry {
        match self {
            Diff::LeftOnly(entry)
            | Diff::RightOnly(entry)
            | Diff::Changed(entry, _)
            | Diff::Nothing(entry) => entry,
        }
    }

    /// Renders the fixture line format: the entry's type character followed
    /// by `----` (left only), `++++` (right only) or the changed-flags
    /// symbol, then the relative path.
    pub fn format_line(&self) -> String {
        let entry = self.entry();
        let marker = match self {
            Diff::LeftOnly(_) => "----".to_string(),
            Diff::RightOnly(_) => "++++".to_string(),
            Diff::Changed(_, flags) => flags.symbol(),
            Diff::Nothing(_) => "~~~~".to_string(),
        };
        format!("{}{marker} {}", entry.type_char(), entry.path)
    }
}

/// Tuning for one diff run.
#[derive(Debug, Default)]
pub struct DiffOptions {
    /// Suppress `RightOnly` results (one-sided comparison).
    pub one_sided: bool,
    /// Compare stored content digests when both sides allow it.
    pub with_hashes: bool,
}

fn entries_by_id(db: &mut DatabaseFile) -> AjfsResult<HashMap<PathId, PathEntry>> {
    let mut map = HashMap::with_capacity(db.entries_count() as usize);
    db.read_all_entries(|_, entry| {
        map.insert(entry.id, entry);
        Ok(Visit::Continue)
    })?;
    Ok(map)
}

fn hashes_by_id(db: &mut DatabaseFile) -> AjfsResult<HashMap<PathId, Vec<u8>>> {
    let mut map = HashMap::new();
    db.read_entries_with_hashes(|_, entry, digest| {
        map.insert(entry.id, digest.to_vec());
        Ok(Visit::Continue)
    })?;
    Ok(map)
}

/// True when the two databases can be compared hash-wise: both carry a hash
/// table and the algorithms are identical.
fn hashes_comparable(lhs: &DatabaseFile, rhs: &DatabaseFile) -> bool {
    match (lhs.hash_algorithm(), rhs.hash_algorithm()) {
        (Some(left), Some(right)) => {
            lhs.has_hash_table() && rhs.has_hash_table() && left == right
        }
        _ => false,
    }
}

/// Compares `lhs` against `rhs`, invoking the visitor once per entry.
///
/// `LeftOnly` and `RightOnly` results come sorted by path ascending; common
/// identifiers follow, also in path order. The visitor may return
/// [`Visit::SkipAll`] to stop cleanly.
pub fn diff_databases<F>(
    lhs: &mut DatabaseFile,
    rhs: &mut DatabaseFile,
    options: &DiffOptions,
    mut visit: F,
) -> AjfsResult<()>
where
    F: FnMut(Diff) -> AjfsResult<Visit>,
{
    let left = entries_by_id(lhs)?;
    let right = entries_by_id(rhs)?;
    let compare_hashes = options.with_hashes && hashes_comparable(lhs, rhs);
    let (left_hashes, right_hashes) = if compare_hashes {
        (hashes_by_id(lhs)?, hashes_by_id(rhs)?)
    } else {
        (HashMap::new(), HashMap::new())
    };

    let mut left_only: Vec<&PathEntry> = left
        .values()
        .filter(|entry| !right.contains_key(&entry.id))
        .collect();
    left_only.sort_by(|a, b| a.path.cmp(&b.path));
    for entry in left_only {
        if visit(Diff::LeftOnly(entry.clone()))? == Visit::SkipAll {
            return Ok(());
        }
    }

    if !options.one_sided {
        let mut right_only: Vec<&PathEntry> = right
            .values()
            .filter(|entry| !left.contains_key(&entry.id))
            .collect();
        right_only.sort_by(|a, b| a.path.cmp(&b.path));
        for entry in right_only {
            if visit(Diff::RightOnly(entry.clone()))? == Visit::SkipAll {
                return Ok(());
            }
        }
    }

    let mut common: Vec<&PathEntry> = left
        .values()
        .filter(|entry| right.contains_key(&entry.id))
        .collect();
    common.sort_by(|a, b| a.path.cmp(&b.path));
    for entry in common {
        let other = &right[&entry.id];
        let mut flags = 0u32;
        if entry.mode != other.mode {
            flags |= CHANGED_MODE;
        }
        if entry.size != other.size {
            flags |= CHANGED_SIZE;
        }
        if entry.mtime != other.mtime {
            flags |= CHANGED_MTIME;
        }
        if compare_hashes {
            if let (Some(left_digest), Some(right_digest)) =
                (left_hashes.get(&entry.id), right_hashes.get(&entry.id))
            {
                if left_digest != right_digest {
                    flags |= CHANGED_HASH;
                }
            }
        }
        let result = if flags == 0 {
            Diff::Nothing(entry.clone())
        } else {
            Diff::Changed(entry.clone(), ChangedFlags(flags))
        };
        if visit(result)? == Visit::SkipAll {
            return Ok(());
        }
    }
    Ok(())
}

/// Transfer-planning mode for [`tosync`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ToSyncMode {
    /// Entry-level comparison ignoring permission and time drift.
    Entries,
    /// Digest-level set difference: report content present on the left that
    /// no file on the right carries, regardless of paths.
    OnlyHashes,
}

/// Emits what still needs copying from `lhs` to `rhs`.
///
/// In `Entries` mode this is a one-sided diff that suppresses changes whose
/// only differences are mode and/or mtime. In `OnlyHashes` mode it is a set
/// difference over digests, and the hash algorithms of the two databases
/// must match.
pub fn tosync<F>(
    lhs: &mut DatabaseFile,
    rhs: &mut DatabaseFile,
    mode: ToSyncMode,
    mut visit: F,
) -> AjfsResult<()>
where
    F: FnMut(Diff) -> AjfsResult<Visit>,
{
    match mode {
        ToSyncMode::Entries => {
            let options = DiffOptions {
                one_sided: true,
                with_hashes: true,
            };
            diff_databases(lhs, rhs, &options, |diff| match &diff {
                Diff::LeftOnly(_) => visit(diff),
                Diff::Changed(_, flags) if !flags.only_mode_or_mtime() => visit(diff),
                _ => Ok(Visit::Continue),
            })
        }
        ToSyncMode::OnlyHashes => {
            let left_algorithm = require_hash_table(lhs)?;
            let right_algorithm = require_hash_table(rhs)?;
            if left_algorithm != right_algorithm {
                return Err(AjfsError::AlgorithmMismatch(
                    left_algorithm.name().to_string(),
                    right_algorithm.name().to_string(),
                ));
            }
            let right_digests: std::collections::HashSet<Vec<u8>> =
                rhs.read_hash_table()?.into_values().collect();
            // One orphan per digest, reported through its lowest-index entry.
            let mut orphans: HashMap<Vec<u8>, u32> = HashMap::new();
            for (index, digest) in lhs.read_hash_table()? {
                if right_digests.contains(&digest) {
                    continue;
                }
                let slot = orphans.entry(digest).or_insert(index);
                *slot = (*slot).min(index);
            }
            let mut entries = Vec::with_capacity(orphans.len());
            for index in orphans.into_values() {
                entries.push(lhs.read_entry_at(index)?);
            }
            entries.sort_by(|a, b| a.path.cmp(&b.path));
            for entry in entries {
                if visit(Diff::LeftOnly(entry))? == Visit::SkipAll {
                    break;
                }
            }
            Ok(())
        }
    }
}

fn require_hash_table(db: &DatabaseFile) -> AjfsResult<crate::hashing::HashAlgorithm> {
    if !db.has_hash_table() {
        return Err(AjfsError::InvalidFormat(format!(
            "database {} has no hash table",
            db.path().display()
        )));
    }
    db.hash_algorithm().ok_or_else(|| {
        AjfsError::InvalidFormat("hash table present but the algorithm is unknown".into())
    })
}
