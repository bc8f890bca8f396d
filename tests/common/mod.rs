#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset, TimeZone, Timelike};

use ajfs::common::AjfsResult;
use ajfs::database::DatabaseFile;
use ajfs::hashing::HashAlgorithm;
use ajfs::header::FEATURE_HASH_TABLE;
use ajfs::path_entry::{Flags, PathEntry};

/// Deterministic timestamp with sub-second precision.
pub fn timestamp(hour: u32, minute: u32, second: u32) -> DateTime<FixedOffset> {
    FixedOffset::east_opt(3600)
        .unwrap()
        .with_ymd_and_hms(2024, 5, 17, hour, minute, second)
        .unwrap()
        .with_nanosecond(123_456_789)
        .unwrap()
}

pub fn dir_entry(path: &str) -> PathEntry {
    PathEntry::new(path.to_string(), 0, Flags::Directory as u32 | 0o755, timestamp(9, 0, 0))
}

pub fn file_entry(path: &str, size: u64) -> PathEntry {
    PathEntry::new(path.to_string(), size, Flags::File as u32 | 0o644, timestamp(10, 30, 0))
}

/// Creates a database holding `entries`, without a hash table.
pub fn build_db(db_path: &Path, root: &Path, entries: &[PathEntry]) -> AjfsResult<()> {
    let mut db = DatabaseFile::create(db_path, root, 0)?;
    for entry in entries {
        db.write_entry(entry)?;
    }
    db.finish_entries()?;
    db.close()
}

/// Creates a database with a hash table; `digests` pairs a path with its
/// content digest. Files without a digest keep a zeroed slot.
pub fn build_hashed_db(
    db_path: &Path,
    root: &Path,
    entries: &[PathEntry],
    algorithm: HashAlgorithm,
    digests: &[(&str, Vec<u8>)],
) -> AjfsResult<()> {
    let mut db = DatabaseFile::create(db_path, root, FEATURE_HASH_TABLE)?;
    let mut indexes = Vec::new();
    for entry in entries {
        let index = db.write_entry(entry)?;
        indexes.push((entry.path.clone(), index));
    }
    db.finish_entries()?;
    db.start_hash_table(algorithm)?;
    for (path, digest) in digests {
        let index = indexes
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, index)| *index)
            .expect("digest for unknown path");
        db.write_hash_entry(index, digest)?;
    }
    db.close()
}

/// Fills `digest_len` bytes from a marker byte, never all-zero.
pub fn fake_digest(marker: u8, algorithm: HashAlgorithm) -> Vec<u8> {
    let mut digest = vec![marker; algorithm.digest_len()];
    digest[0] = marker.max(1);
    digest
}

/// Writes a file, creating parent directories as needed.
pub fn write_file(root: &Path, relative: &str, contents: &[u8]) -> PathBuf {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("failure creating parent directories");
    }
    fs::write(&path, contents).expect("failure writing test file");
    path
}
