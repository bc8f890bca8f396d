//! Drivers for `diff` and `tosync`.
//!
//! Either side may be an existing database or a directory; directories are
//! scanned into scratch databases inside a temporary directory that is
//! removed when the command finishes.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::common::{AjfsError, AjfsResult, Visit};
use crate::database::DatabaseFile;
use crate::diff::{diff_databases, tosync, Diff, DiffOptions, ToSyncMode};
use crate::hashing::HashAlgorithm;

use super::scan::scan_to_scratch;
use super::CommonConfig;

#[derive(Debug)]
pub struct DiffArgs {
    pub lhs: PathBuf,
    pub rhs: PathBuf,
    pub with_hashes: bool,
}

/// Opens a comparison side: an existing database as-is, a directory through
/// a scratch scan.
fn resolve_side(
    path: &Path,
    scratch: &TempDir,
    name: &str,
    with_hashes: bool,
    algorithm: HashAlgorithm,
    config: &CommonConfig,
) -> AjfsResult<DatabaseFile> {
    if path.is_dir() {
        let db_path = scratch.path().join(name);
        scan_to_scratch(path, &db_path, with_hashes, algorithm, config)?;
        return DatabaseFile::open(&db_path);
    }
    if !path.exists() {
        return Err(AjfsError::NotFound(path.display().to_string()));
    }
    DatabaseFile::open(path)
}

/// Picks the hash algorithm for scratch scans: whatever an existing database
/// side uses, SHA-1 otherwise.
fn scratch_algorithm(lhs: &Path, rhs: &Path) -> HashAlgorithm {
    for side in [lhs, rhs] {
        if side.is_file() {
            if let Ok(mut db) = DatabaseFile::open(side) {
                let algorithm = db.hash_algorithm();
                let _ = db.close();
                if let Some(algorithm) = algorithm {
                    return algorithm;
                }
            }
        }
    }
    HashAlgorithm::Sha1
}

/// Compares the two sides and prints one line per addition, removal or
/// mutation.
pub fn diff(args: &DiffArgs, config: &CommonConfig, out: &mut dyn Write) -> AjfsResult<()> {
    let scratch = TempDir::new()?;
    let algorithm = scratch_algorithm(&args.lhs, &args.rhs);
    let mut lhs = resolve_side(
        &args.lhs,
        &scratch,
        "lhs.ajfs",
        args.with_hashes,
        algorithm,
        config,
    )?;
    let mut rhs = resolve_side(
        &args.rhs,
        &scratch,
        "rhs.ajfs",
        args.with_hashes,
        algorithm,
        config,
    )?;

    let options = DiffOptions {
        one_sided: false,
        with_hashes: args.with_hashes,
    };
    let mut differences = 0u64;
    let mut failure: Result<(), crate::common::AjfsError> = Ok(());
    diff_databases(&mut lhs, &mut rhs, &options, |diff| {
        if matches!(diff, Diff::Nothing(_)) {
            return Ok(Visit::Continue);
        }
        differences += 1;
        if let Err(e) = writeln!(out, "{}", diff.format_line()) {
            failure = Err(e.into());
            return Ok(Visit::SkipAll);
        }
        Ok(Visit::Continue)
    })?;
    lhs.close()?;
    rhs.close()?;
    failure?;
    log::info!("diff found {differences} differences");
    Ok(())
}

#[derive(Debug)]
pub struct ToSyncArgs {
    pub lhs: PathBuf,
    pub rhs: PathBuf,
    pub only_hashes: bool,
}

/// Prints what still needs copying from the left side to the right side.
pub fn run_tosync(args: &ToSyncArgs, config: &CommonConfig, out: &mut dyn Write) -> AjfsResult<()> {
    let scratch = TempDir::new()?;
    let algorithm = scratch_algorithm(&args.lhs, &args.rhs);
    // Hash tables are required in hash mode and useful either way.
    let mut lhs = resolve_side(
        &args.lhs,
        &scratch,
        "lhs.ajfs",
        args.only_hashes,
        algorithm,
        config,
    )?;
    let mut rhs = resolve_side(
        &args.rhs,
        &scratch,
        "rhs.ajfs",
        args.only_hashes,
        algorithm,
        config,
    )?;
    let mode = if args.only_hashes {
        ToSyncMode::OnlyHashes
    } else {
        ToSyncMode::Entries
    };
    let mut failure: Result<(), crate::common::AjfsError> = Ok(());
    tosync(&mut lhs, &mut rhs, mode, |diff| {
        if let Err(e) = writeln!(out, "{}", diff.format_line()) {
            failure = Err(e.into());
            return Ok(Visit::SkipAll);
        }
        Ok(Visit::Continue)
    })?;
    lhs.close()?;
    rhs.close()?;
    failure
}
