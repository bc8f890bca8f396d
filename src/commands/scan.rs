//! Drivers for the writing operations: `scan`, `resume` and `update`.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset};
use log::{info, warn};

use crate::common::{AjfsError, AjfsResult, Visit};
use crate::database::DatabaseFile;
use crate::hashing::{hash_file, HashAlgorithm};
use crate::header::FEATURE_HASH_TABLE;
use crate::path_entry::{PathEntry, PathId};
use crate::scanner;

use super::{parse_filters, CommonConfig};

#[derive(Debug)]
pub struct ScanArgs {
    pub db: PathBuf,
    pub root: PathBuf,
    pub hash: bool,
    pub algorithm: HashAlgorithm,
    pub force: bool,
    pub includes: Vec<String>,
    pub excludes: Vec<String>,
}

/// Captures a snapshot of `root` into a new database.
pub fn scan(args: &ScanArgs, config: &CommonConfig, out: &mut dyn Write) -> AjfsResult<()> {
    if args.force && args.db.exists() {
        std::fs::remove_file(&args.db)?;
    }
    if !args.root.is_dir() {
        return Err(AjfsError::NotFound(args.root.display().to_string()));
    }
    let filters = parse_filters(&args.includes, &args.excludes)?;
    let features = if args.hash { FEATURE_HASH_TABLE } else { 0 };
    let mut db = DatabaseFile::create(&args.db, &args.root, features)?;
    let mut progress = config.progress_sink();
    let written = scanner::scan(&args.root, &filters, &mut db, &config.cancel, &mut *progress)?;
    db.finish_entries()?;

    let mut hashed = 0u64;
    if args.hash {
        db.start_hash_table(args.algorithm)?;
        hashed = hash_pending(&mut db, config, &mut *progress)?;
    }
    db.close()?;
    progress.finish();

    writeln!(out, "scanned {written} entries into {}", args.db.display())?;
    if args.hash {
        writeln!(
            out,
            "hashed {hashed} of {} files ({})",
            db.file_entries_count(),
            args.algorithm
        )?;
    }
    Ok(())
}

/// Hashes every file whose slot is still zeroed, flushing slot by slot so an
/// interrupt leaves the database resumable.
fn hash_pending(
    db: &mut DatabaseFile,
    config: &CommonConfig,
    progress: &mut dyn crate::progress::ProgressSink,
) -> AjfsResult<u64> {
    let root = PathBuf::from(db.root());
    let algorithm = db
        .hash_algorithm()
        .expect("hash table must be started before hashing");
    let mut pending: Vec<(u32, PathEntry)> = Vec::new();
    db.entries_need_hashing(|index, entry| {
        pending.push((index, entry));
        Ok(Visit::Continue)
    })?;
    let mut hashed = 0u64;
    for (index, entry) in pending {
        config.cancel.check()?;
        let file_path = resolve_entry_path(&root, &entry.path);
        let digest = match hash_file(&file_path, algorithm) {
            Ok(digest) => digest,
            Err(e) => {
                warn!("could not hash {}: {e}", entry.path);
                continue;
            }
        };
        db.write_hash_entry(index, &digest)?;
        db.flush()?;
        progress.item(&entry.path);
        hashed += 1;
    }
    Ok(hashed)
}

fn resolve_entry_path(root: &Path, relative: &str) -> PathBuf {
    if relative == "." {
        return root.to_path_buf();
    }
    let mut path = root.to_path_buf();
    for part in relative.split('/') {
        path.push(part);
    }
    path
}

#[derive(Debug)]
pub struct ResumeArgs {
    pub db: PathBuf,
}

/// Continues filling hash slots left zeroed by an interrupted `scan` or by
/// `update`.
pub fn resume(args: &ResumeArgs, config: &CommonConfig, out: &mut dyn Write) -> AjfsResult<()> {
    let mut db = DatabaseFile::resume_database(&args.db)?;
    let mut progress = config.progress_sink();
    let before_pending = db.file_entries_count() as u64 - db.read_hash_table()?.len() as u64;
    let hashed = hash_pending(&mut db, config, &mut *progress)?;
    db.close()?;
    progress.finish();
    info!("resume hashed {hashed} files");
    writeln!(
        out,
        "hashed {hashed} files, {} still pending",
        before_pending - hashed
    )?;
    Ok(())
}

#[derive(Debug)]
pub struct UpdateArgs {
    pub db: PathBuf,
    pub force: bool,
}

/// Re-scans the stored root into a fresh database, carrying over the digest
/// of every file whose identifier, size and mtime are unchanged, then
/// atomically replaces the original file.
pub fn update(args: &UpdateArgs, config: &CommonConfig, out: &mut dyn Write) -> AjfsResult<()> {
    let mut old = DatabaseFile::open(&args.db)?;
    let root = PathBuf::from(old.root());
    if !root.is_dir() {
        return Err(AjfsError::NotFound(format!(
            "snapshot root {} no longer exists",
            root.display()
        )));
    }
    let algorithm = old.hash_algorithm();
    let features = old.header().feature_flags;

    // Previous digests keyed by identifier, with the metadata that must be
    // unchanged for the digest to be carried over.
    let mut previous: HashMap<PathId, (u64, DateTime<FixedOffset>, Vec<u8>)> = HashMap::new();
    if old.has_hash_table() {
        old.read_entries_with_hashes(|_, entry, digest| {
            previous.insert(entry.id, (entry.size, entry.mtime, digest.to_vec()));
            Ok(Visit::Continue)
        })?;
    }

    let scratch_path = scratch_path_for(&args.db);
    if scratch_path.exists() {
        if !args.force {
            return Err(AjfsError::AlreadyExists(scratch_path.display().to_string()));
        }
        std::fs::remove_file(&scratch_path)?;
    }

    let mut progress = config.progress_sink();
    let mut fresh = DatabaseFile::create(&scratch_path, &root, features)?;
    let written = scanner::scan(
        &root,
        &Default::default(),
        &mut fresh,
        &config.cancel,
        &mut *progress,
    )?;
    fresh.finish_entries()?;

    let mut carried = 0u64;
    if let Some(algorithm) = algorithm {
        fresh.start_hash_table(algorithm)?;
        let mut unchanged: Vec<(u32, Vec<u8>)> = Vec::new();
        fresh.entries_need_hashing(|index, entry| {
            if let Some((size, mtime, digest)) = previous.get(&entry.id) {
                if *size == entry.size && *mtime == entry.mtime {
                    unchanged.push((index, digest.clone()));
                }
            }
            Ok(Visit::Continue)
        })?;
        for (index, digest) in unchanged {
            config.cancel.check()?;
            fresh.write_hash_entry(index, &digest)?;
            carried += 1;
        }
    }
    fresh.close()?;
    old.close()?;
    std::fs::rename(&scratch_path, &args.db)?;
    progress.finish();

    writeln!(out, "updated {}: {written} entries", args.db.display())?;
    if algorithm.is_some() {
        writeln!(
            out,
            "carried {carried} digests over, run `ajfs resume` for the rest"
        )?;
    }
    Ok(())
}

fn scratch_path_for(db: &Path) -> PathBuf {
    let mut name = db
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "db.ajfs".to_string());
    name.push_str(".tmp");
    db.with_file_name(name)
}

/// Used by `diff`/`tosync` when a side is a directory: scans it into a
/// scratch database at `db_path`.
pub fn scan_to_scratch(
    root: &Path,
    db_path: &Path,
    with_hashes: bool,
    algorithm: HashAlgorithm,
    config: &CommonConfig,
) -> AjfsResult<()> {
    let features = if with_hashes { FEATURE_HASH_TABLE } else { 0 };
    let mut db = DatabaseFile::create(db_path, root, features)?;
    let mut progress = config.progress_sink();
    scanner::scan(root, &Default::default(), &mut db, &config.cancel, &mut *progress)?;
    db.finish_entries()?;
    if with_hashes {
        db.start_hash_table(algorithm)?;
        hash_pending(&mut db, config, &mut *progress)?;
    }
    db.close()
}
