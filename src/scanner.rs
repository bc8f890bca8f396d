//! # Directory Scanner
//!
//! Walks a directory hierarchy depth-first and streams one path entry per
//! directory and regular file into a database in `WritingEntries` state.
//! Include and exclude filters are regular expressions matched against the
//! forward-slash relative path; directory excludes prune whole subtrees.
//!
//! OS-noise files (`.DS_Store`, and AppleDouble `._*` files on Darwin) are
//! silently dropped by default.

use std::path::{Path, PathBuf};

use log::{debug, warn};
use regex::Regex;
use walkdir::WalkDir;

use crate::common::{AjfsResult, CancelToken};
use crate::database::DatabaseFile;
use crate::path_entry::PathEntry;
use crate::progress::ProgressSink;

/// Filter configuration for a scan.
///
/// Include filters, when non-empty, require a match for the path to be
/// recorded; exclude filters drop matches. Directory excludes additionally
/// prune the subtree below the excluded directory.
#[derive(Debug, Default)]
pub struct ScanConfig {
    pub dir_includes: Vec<Regex>,
    pub file_includes: Vec<Regex>,
    pub dir_excludes: Vec<Regex>,
    pub file_excludes: Vec<Regex>,
}

impl ScanConfig {
    pub fn dir_included(&self, path: &str) -> bool {
        if self.dir_excludes.iter().any(|re| re.is_match(path)) {
            return false;
        }
        self.dir_includes.is_empty() || self.dir_includes.iter().any(|re| re.is_match(path))
    }

    pub fn file_included(&self, path: &str, name: &str) -> bool {
        if is_os_noise(name) {
            return false;
        }
        if self.file_excludes.iter().any(|re| re.is_match(path)) {
            return false;
        }
        self.file_includes.is_empty() || self.file_includes.iter().any(|re| re.is_match(path))
    }
}

fn is_os_noise(name: &str) -> bool {
    if name == ".DS_Store" {
        return true;
    }
    cfg!(target_os = "macos") && name.starts_with("._")
}

/// Converts an absolute path under `root` to the stored relative form:
/// forward-slash separated, `.` for the root itself.
pub fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    if relative.as_os_str().is_empty() {
        return Some(".".to_string());
    }
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}

/// Walks `root` and writes one entry per retained path into `db`.
///
/// The cancellation token is checked on every entry; a triggered token
/// returns [`crate::common::AjfsError::Cancelled`] without attempting to
/// finish the entries region. Returns the number of entries written.
pub fn scan(
    root: &Path,
    config: &ScanConfig,
    db: &mut DatabaseFile,
    cancel: &CancelToken,
    progress: &mut dyn ProgressSink,
) -> AjfsResult<u64> {
    let root: PathBuf = crate::common::absolutize_path(root);
    let mut written = 0u64;
    let mut walker = WalkDir::new(&root).follow_links(false).into_iter();
    loop {
        cancel.check()?;
        let dir_entry = match walker.next() {
            None => break,
            Some(Ok(dir_entry)) => dir_entry,
            Some(Err(e)) => {
                warn!("skipping unreadable path: {e}");
                continue;
            }
        };
        let Some(path) = relative_path(&root, dir_entry.path()) else {
            continue;
        };
        let name = dir_entry.file_name().to_string_lossy().into_owned();
        let file_type = dir_entry.file_type();
        if file_type.is_dir() {
            if path != "." && !config.dir_included(&path) {
                debug!("pruning directory {path}");
                walker.skip_current_dir();
                continue;
            }
        } else if !config.file_included(&path, &name) {
            continue;
        }
        let metadata = match dir_entry.metadata() {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!("skipping {path}: {e}");
                continue;
            }
        };
        let entry = PathEntry::from_metadata(path, &metadata)?;
        progress.item(&entry.path);
        db.write_entry(&entry)?;
        written += 1;
    }
    debug!("scan of {} wrote {written} entries", root.display());
    Ok(written)
}
