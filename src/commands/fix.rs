//! Driver for `fix`: header verification, repair and restore.

use std::io::Write;
use std::path::PathBuf;

use crate::common::AjfsResult;
use crate::fix::{fix, restore_header, verify};

use super::CommonConfig;

#[derive(Debug)]
pub struct FixArgs {
    pub db: PathBuf,
    pub dry_run: bool,
    pub backup: Option<PathBuf>,
    pub restore: Option<PathBuf>,
}

pub fn run(args: &FixArgs, _config: &CommonConfig, out: &mut dyn Write) -> AjfsResult<()> {
    if let Some(backup) = &args.restore {
        restore_header(&args.db, backup)?;
        verify(&args.db)?;
        writeln!(out, "restored header of {}", args.db.display())?;
        return Ok(());
    }
    let backup = args
        .backup
        .clone()
        .unwrap_or_else(|| default_backup_path(&args.db));
    fix(&args.db, out, args.dry_run, &backup)?;
    if !args.dry_run {
        verify(&args.db)?;
    }
    Ok(())
}

fn default_backup_path(db: &PathBuf) -> PathBuf {
    let mut name = db
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "db.ajfs".to_string());
    name.push_str(".header.bak");
    db.with_file_name(name)
}
