//! # Snapshot Statistics
//!
//! One-pass aggregations over a database's entries and hash table, used by
//! the `info` command and reported after scans.

use std::collections::HashMap;

use crate::common::{AjfsResult, Visit};
use crate::database::DatabaseFile;

/// Aggregate counters over a database's entries.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Stats {
    /// Number of directories.
    pub dir_count: u64,
    /// Number of regular files.
    pub file_count: u64,
    /// Number of symbolic links.
    pub symlink_count: u64,
    /// Number of entries of any other type (pipes, sockets, devices).
    pub other_count: u64,
    /// Total size of all regular files in bytes.
    pub total_file_size: u64,
    /// Size of the largest regular file in bytes.
    pub max_file_size: u64,
    /// Average regular-file size in bytes (0 when there are no files).
    pub avg_file_size: u64,
}

/// Aggregate counters over a database's hash table.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct HashTableStats {
    /// Slots holding a computed digest.
    pub hashed_count: u64,
    /// Slots still zeroed (pending).
    pub pending_count: u64,
    /// Number of duplicate groups (digests shared by two or more files).
    pub duplicate_groups: u64,
    /// Number of files beyond the first copy in each duplicate group.
    pub duplicate_files: u64,
    /// Bytes that deleting the extra copies would reclaim.
    pub reclaimable_bytes: u64,
}

/// Computes entry statistics in a single pass over the database.
pub fn calculate_stats(db: &mut DatabaseFile) -> AjfsResult<Stats> {
    let mut stats = Stats::default();
    db.read_all_entries(|_, entry| {
        if entry.is_directory() {
            stats.dir_count += 1;
        } else if entry.is_file() {
            stats.file_count += 1;
            stats.total_file_size += entry.size;
            stats.max_file_size = stats.max_file_size.max(entry.size);
        } else if entry.is_symlink() {
            stats.symlink_count += 1;
        } else {
            stats.other_count += 1;
        }
        Ok(Visit::Continue)
    })?;
    if stats.file_count > 0 {
        stats.avg_file_size = stats.total_file_size / stats.file_count;
    }
    Ok(stats)
}

/// Computes hash-table statistics: progress counters plus how much space the
/// duplicate copies occupy.
pub fn calculate_hash_table_stats(db: &mut DatabaseFile) -> AjfsResult<HashTableStats> {
    let mut stats = HashTableStats::default();
    let hashes = db.read_hash_table()?;
    stats.hashed_count = hashes.len() as u64;
    stats.pending_count = db.file_entries_count() as u64 - stats.hashed_count;

    let mut buckets: HashMap<&[u8], Vec<u32>> = HashMap::new();
    for (index, digest) in &hashes {
        buckets.entry(digest.as_slice()).or_default().push(*index);
    }
    for indexes in buckets.values() {
        if indexes.len() < 2 {
            continue;
        }
        stats.duplicate_groups += 1;
        stats.duplicate_files += indexes.len() as u64 - 1;
        for index in &indexes[1..] {
            stats.reclaimable_bytes += db.read_entry_at(*index)?.size;
        }
    }
    Ok(stats)
}
