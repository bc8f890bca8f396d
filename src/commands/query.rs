//! Drivers for the read-only query operations: `list`, `info`, `tree` and
//! `search`.

use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;

use chrono::{Local, SecondsFormat};

use crate::common::{AjfsResult, Visit};
use crate::database::DatabaseFile;
use crate::search::SearchExpr;
use crate::stats::{calculate_hash_table_stats, calculate_stats};
use crate::tree::PathTree;

use super::{parse_filters, CommonConfig};

/// Flag-derived atomic predicates shared by `list` and `search`.
#[derive(Debug, Default)]
pub struct PredicateArgs {
    pub type_selector: Option<String>,
    pub size: Option<String>,
    pub iname: Option<String>,
    pub iregex: Option<String>,
    pub hash_prefix: Option<String>,
    pub id_prefix: Option<String>,
    pub before: Option<String>,
    pub after: Option<String>,
}

/// AND-combines the positional expression (a path regex) with every
/// flag-derived predicate. Invalid input fails here, before the database is
/// touched.
pub fn build_expr(
    positional: Option<&str>,
    predicates: &PredicateArgs,
) -> AjfsResult<SearchExpr> {
    let now = Local::now().fixed_offset();
    let mut expr = SearchExpr::Always;
    if let Some(pattern) = positional {
        expr = expr.and(SearchExpr::regex(pattern)?);
    }
    if let Some(selector) = &predicates.type_selector {
        expr = expr.and(SearchExpr::entry_type(selector)?);
    }
    if let Some(size) = &predicates.size {
        expr = expr.and(SearchExpr::size(size)?);
    }
    if let Some(glob) = &predicates.iname {
        expr = expr.and(SearchExpr::shell_pattern(glob, true, true)?);
    }
    if let Some(pattern) = &predicates.iregex {
        expr = expr.and(SearchExpr::regex(&format!("(?i){pattern}"))?);
    }
    if let Some(prefix) = &predicates.hash_prefix {
        expr = expr.and(SearchExpr::hash_prefix(prefix)?);
    }
    if let Some(prefix) = &predicates.id_prefix {
        expr = expr.and(SearchExpr::id_prefix(prefix)?);
    }
    if let Some(bound) = &predicates.before {
        expr = expr.and(SearchExpr::mod_time_before(bound, now)?);
    }
    if let Some(bound) = &predicates.after {
        expr = expr.and(SearchExpr::mod_time_after(bound, now)?);
    }
    Ok(expr)
}

#[derive(Debug)]
pub struct ListArgs {
    pub db: PathBuf,
    pub minimal: bool,
    pub full: bool,
    pub show_hash: bool,
    pub limit: Option<u64>,
    pub includes: Vec<String>,
    pub excludes: Vec<String>,
    pub predicates: PredicateArgs,
}

/// Streams matching entries to `out`.
pub fn list(args: &ListArgs, _config: &CommonConfig, out: &mut dyn Write) -> AjfsResult<()> {
    let expr = build_expr(None, &args.predicates)?;
    let filters = parse_filters(&args.includes, &args.excludes)?;
    let mut db = DatabaseFile::open(&args.db)?;
    let digests = if (expr.requires_hash() || args.show_hash) && db.has_hash_table() {
        db.read_hash_table()?
    } else {
        HashMap::new()
    };

    let mut matched = 0u64;
    let mut failure = Ok(());
    db.read_all_entries(|index, entry| {
        let retained = if entry.is_directory() {
            filters.dir_included(&entry.path)
        } else {
            let name = entry.path.rsplit('/').next().unwrap_or(&entry.path);
            filters.file_included(&entry.path, name)
        };
        let digest = digests.get(&index).map(|d| d.as_slice());
        if !retained || !expr.matches(&entry, digest) {
            return Ok(Visit::Continue);
        }
        matched += 1;
        let line = format_entry(&entry, digest, args.minimal, args.full, args.show_hash);
        if let Err(e) = writeln!(out, "{line}") {
            failure = Err(e.into());
            return Ok(Visit::SkipAll);
        }
        if args.limit.is_some_and(|limit| matched >= limit) {
            return Ok(Visit::SkipAll);
        }
        Ok(Visit::Continue)
    })?;
    db.close()?;
    failure
}

fn format_entry(
    entry: &crate::path_entry::PathEntry,
    digest: Option<&[u8]>,
    minimal: bool,
    full: bool,
    show_hash: bool,
) -> String {
    if minimal {
        return entry.path.clone();
    }
    let mut line = String::new();
    if full {
        line.push_str(&entry.id_hex());
        line.push(' ');
    }
    line.push(entry.type_char());
    line.push_str(&entry.permissions_string());
    line.push_str(&format!(
        " {:>12} {} ",
        entry.size,
        entry.mtime.to_rfc3339_opts(SecondsFormat::Secs, true)
    ));
    if show_hash {
        match digest {
            Some(digest) => line.push_str(&format!("{} ", hex::encode(digest))),
            None => line.push_str("- "),
        }
    }
    line.push_str(&entry.path);
    line
}

#[derive(Debug)]
pub struct InfoArgs {
    pub db: PathBuf,
}

/// Prints the database header, provenance record and (verbose) statistics.
pub fn info(args: &InfoArgs, config: &CommonConfig, out: &mut dyn Write) -> AjfsResult<()> {
    let mut db = DatabaseFile::open(&args.db)?;
    writeln!(out, "database:  {}", db.path().display())?;
    writeln!(out, "version:   {}", db.header().version)?;
    writeln!(out, "root:      {}", db.root())?;
    writeln!(
        out,
        "created:   {} ({}/{}, {})",
        db.meta().created.to_rfc3339_opts(SecondsFormat::Secs, true),
        db.meta().os,
        db.meta().arch,
        db.meta().tool
    )?;
    writeln!(
        out,
        "entries:   {} ({} files)",
        db.entries_count(),
        db.file_entries_count()
    )?;
    match db.hash_algorithm() {
        Some(algorithm) => writeln!(out, "features:  hash-table ({algorithm})")?,
        None => writeln!(out, "features:  none")?,
    }
    if config.verbose {
        let stats = calculate_stats(&mut db)?;
        writeln!(out, "directories:      {}", stats.dir_count)?;
        writeln!(out, "files:            {}", stats.file_count)?;
        writeln!(out, "symlinks:         {}", stats.symlink_count)?;
        writeln!(out, "other entries:    {}", stats.other_count)?;
        writeln!(out, "total file size:  {}", stats.total_file_size)?;
        writeln!(out, "largest file:     {}", stats.max_file_size)?;
        writeln!(out, "average file:     {}", stats.avg_file_size)?;
        if db.has_hash_table() {
            let hash_stats = calculate_hash_table_stats(&mut db)?;
            writeln!(out, "hashed files:     {}", hash_stats.hashed_count)?;
            writeln!(out, "pending files:    {}", hash_stats.pending_count)?;
            writeln!(out, "duplicate groups: {}", hash_stats.duplicate_groups)?;
            writeln!(out, "reclaimable:      {}", hash_stats.reclaimable_bytes)?;
        }
    }
    db.close()
}

#[derive(Debug)]
pub struct TreeArgs {
    pub db: PathBuf,
    pub subpath: Option<String>,
    pub dirs_only: bool,
}

/// Renders the snapshot as an indented tree, optionally starting below a
/// subpath.
pub fn tree(args: &TreeArgs, _config: &CommonConfig, out: &mut dyn Write) -> AjfsResult<()> {
    let mut db = DatabaseFile::open(&args.db)?;
    let mut path_tree = PathTree::new();
    db.read_all_entries(|_, entry| {
        path_tree.insert(entry);
        Ok(Visit::Continue)
    })?;
    db.close()?;
    let start = match &args.subpath {
        Some(subpath) => path_tree.find(subpath).ok_or_else(|| {
            crate::common::AjfsError::NotFound(format!("no such path in snapshot: {subpath}"))
        })?,
        None => PathTree::ROOT,
    };
    path_tree.write_tree(out, start, args.dirs_only)
}

#[derive(Debug)]
pub struct SearchArgs {
    pub db: PathBuf,
    pub expression: String,
    pub limit: Option<u64>,
    pub predicates: PredicateArgs,
}

/// Evaluates a search expression over every entry and prints the matches.
pub fn search(args: &SearchArgs, _config: &CommonConfig, out: &mut dyn Write) -> AjfsResult<()> {
    let expr = build_expr(Some(&args.expression), &args.predicates)?;
    let mut db = DatabaseFile::open(&args.db)?;
    let digests = if expr.requires_hash() && db.has_hash_table() {
        db.read_hash_table()?
    } else {
        HashMap::new()
    };
    let mut matched = 0u64;
    let mut failure = Ok(());
    db.read_all_entries(|index, entry| {
        let digest = digests.get(&index).map(|d| d.as_slice());
        if !expr.matches(&entry, digest) {
            return Ok(Visit::Continue);
        }
        matched += 1;
        if let Err(e) = writeln!(out, "{} {}", entry.type_char(), entry.path) {
            failure = Err(e.into());
            return Ok(Visit::SkipAll);
        }
        if args.limit.is_some_and(|limit| matched >= limit) {
            return Ok(Visit::SkipAll);
        }
        Ok(Visit::Continue)
    })?;
    db.close()?;
    failure
}
