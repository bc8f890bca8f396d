//! # Common Types and Utilities
//!
//! This module provides common types, error handling, and utility functions used
//! throughout the AJFS implementation. It includes:
//! - Error handling infrastructure and the crate-wide result alias
//! - Iteration control values (`Visit`) for streaming callbacks
//! - The cooperative cancellation token
//! - Constants for the on-disk format and default file naming

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Magic bytes at the start of every database file.
pub const FILE_SIGNATURE: &[u8; 4] = b"AJFS";
/// Sentinel bytes framing the entries lookup table.
pub const LOOKUP_SENTINEL: &[u8; 4] = b"AJCC";
/// Sentinel bytes framing the hash-table block.
pub const HASH_SENTINEL: &[u8; 4] = b"AJHX";
/// Highest database format version this build can read.
pub const SUPPORTED_VERSION: u16 = 1;
/// Default database file name used by the CLI when none is given.
pub const DEFAULT_DB_NAME: &str = "db.ajfs";

pub type AjfsResult<R> = Result<R, AjfsError>;

/// Represents errors that can occur during AJFS operations
///
/// This enum covers the error conditions that may arise while creating,
/// reading, repairing or comparing snapshot databases.
#[derive(Debug, thiserror::Error)]
pub enum AjfsError {
    #[error("file not found: {0}")]
    NotFound(String),
    #[error("file already exists: {0}")]
    AlreadyExists(String),
    #[error("invalid database format: {0}")]
    InvalidFormat(String),
    #[error("checksum mismatch (stored {stored:#010x}, computed {computed:#010x})")]
    ChecksumMismatch { stored: u32, computed: u32 },
    #[error("truncated file: {0}")]
    Truncated(String),
    #[error("can't compare the two databases: hash algorithms differ ({0} vs {1})")]
    AlgorithmMismatch(String, String),
    #[error("invalid expression: {0}")]
    InvalidExpression(String),
    #[error("operation cancelled")]
    Cancelled,
    #[error("database needs fixing, re-run without --dry-run")]
    NeedsFix,
    #[error("operation not valid for a database opened in {0} mode")]
    ModeMismatch(&'static str),
    #[error("IO error: {0}")]
    IO(String),
}

impl From<std::io::Error> for AjfsError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::NotFound => AjfsError::NotFound(e.to_string()),
            std::io::ErrorKind::AlreadyExists => AjfsError::AlreadyExists(e.to_string()),
            std::io::ErrorKind::UnexpectedEof => AjfsError::Truncated(e.to_string()),
            _ => AjfsError::IO(e.to_string()),
        }
    }
}

impl From<String> for AjfsError {
    fn from(value: String) -> Self {
        AjfsError::IO(value)
    }
}

impl From<&str> for AjfsError {
    fn from(value: &str) -> Self {
        AjfsError::IO(value.to_string())
    }
}

/// Flow control returned by streaming visitor callbacks.
///
/// `SkipAll` requests a clean early stop of the iteration; it is a successful
/// outcome for the caller, never an error.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Visit {
    Continue,
    SkipAll,
}

/// One-way cancellation signal shared between an operation and its caller.
///
/// Long-running operations (scanning, hashing) check the token between units
/// of work and return [`AjfsError::Cancelled`] when it has been triggered.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Returns `Err(Cancelled)` if the token has been triggered.
    pub fn check(&self) -> AjfsResult<()> {
        if self.is_cancelled() {
            Err(AjfsError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Converts a path to its absolute, normalized form.
///
/// If canonicalization fails (e.g. the path does not exist yet), falls back
/// to joining the path onto the current directory.
pub fn absolutize_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(path))
                .unwrap_or_else(|_| path.to_path_buf())
        }
    })
}

/// Case-insensitive test of whether `digest`'s hex form starts with `prefix`.
pub fn hex_has_prefix(digest: &[u8], prefix: &str) -> bool {
    hex::encode(digest).starts_with(&prefix.to_ascii_lowercase())
}
