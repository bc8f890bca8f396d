//! # Operation Drivers
//!
//! One driver per CLI verb. Drivers translate parsed arguments into calls on
//! the core subsystems (database, scanner, diff engine, search evaluator)
//! and render results to an output sink. They hold no state of their own.

pub mod diff;
pub mod dupes;
pub mod export;
pub mod fix;
pub mod query;
pub mod scan;

use std::path::PathBuf;

use regex::Regex;

use crate::common::{AjfsError, AjfsResult, CancelToken, DEFAULT_DB_NAME};
use crate::progress::{ConsoleProgress, NullProgress, ProgressSink};
use crate::scanner::ScanConfig;

/// Per-operation configuration bundling the output behavior every command
/// shares.
#[derive(Debug, Clone, Default)]
pub struct CommonConfig {
    pub verbose: bool,
    pub progress: bool,
    pub cancel: CancelToken,
}

impl CommonConfig {
    pub fn progress_sink(&self) -> Box<dyn ProgressSink> {
        if self.progress {
            Box::new(ConsoleProgress::new())
        } else {
            Box::new(NullProgress)
        }
    }
}

/// Applies the default database path when none was given.
pub fn resolve_db_path(db: Option<PathBuf>) -> PathBuf {
    db.unwrap_or_else(|| PathBuf::from(DEFAULT_DB_NAME))
}

/// Builds the scanner filter set from repeatable `--include`/`--exclude`
/// regex arguments. A `f:` prefix restricts the pattern to files, `d:` to
/// directories; an unprefixed pattern applies to both.
pub fn parse_filters(includes: &[String], excludes: &[String]) -> AjfsResult<ScanConfig> {
    let mut config = ScanConfig::default();
    for pattern in includes {
        let (files, dirs, pattern) = split_filter(pattern);
        let regex = compile_filter(pattern)?;
        if files {
            config.file_includes.push(regex.clone());
        }
        if dirs {
            config.dir_includes.push(regex);
        }
    }
    for pattern in excludes {
        let (files, dirs, pattern) = split_filter(pattern);
        let regex = compile_filter(pattern)?;
        if files {
            config.file_excludes.push(regex.clone());
        }
        if dirs {
            config.dir_excludes.push(regex);
        }
    }
    Ok(config)
}

fn split_filter(pattern: &str) -> (bool, bool, &str) {
    if let Some(rest) = pattern.strip_prefix("f:") {
        (true, false, rest)
    } else if let Some(rest) = pattern.strip_prefix("d:") {
        (false, true, rest)
    } else {
        (true, true, pattern)
    }
}

fn compile_filter(pattern: &str) -> AjfsResult<Regex> {
    Regex::new(pattern)
        .map_err(|e| AjfsError::InvalidExpression(format!("invalid filter {pattern}: {e}")))
}
