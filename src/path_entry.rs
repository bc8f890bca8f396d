//! # Path Entries
//!
//! This module provides the semantic record stored for every path captured in
//! a snapshot database. Path entries represent directories, regular files,
//! symlinks and other filesystem objects, and contain metadata such as size,
//! mode bits and the last-modification time.
//!
//! ## Identifiers
//!
//! Every entry carries a fixed 20-byte identifier: the SHA-1 digest of its
//! relative path string (forward-slash separators, `.` for the root). The
//! identifier is derived from the path at write time; equality of identifiers
//! implies equality of the path strings.
//!
//! ## Mode bits
//!
//! The low 12 bits of an entry's mode are the Unix permission bits; the type
//! of the filesystem object is encoded in dedicated flag bits above them so
//! that type tests never depend on platform `st_mode` constants.

use std::fs::Metadata;
use std::io::{Read, Write};
use std::ops::BitAnd;

use chrono::{DateTime, FixedOffset, Local};
use sha1::{Digest, Sha1};

use crate::codec;
use crate::common::AjfsResult;

/// Size in bytes of a path identifier (SHA-1 digest).
pub const ID_LEN: usize = 20;

/// Maximum accepted length of a stored path string.
pub const MAX_PATH_LEN: u64 = 64 * 1024;

/// A path identifier: the SHA-1 digest of the relative path string.
pub type PathId = [u8; ID_LEN];

/// Flags representing the type of a path entry.
///
/// These bits live above the Unix permission bits in the entry's mode field
/// and indicate what kind of filesystem object the entry describes. The
/// `File` bit is the standalone regular-file sub-flag used by type searches.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Flags {
    /// Entry is a directory.
    Directory = 1 << 16,
    /// Entry is a regular file.
    File = 1 << 17,
    /// Entry is a symbolic link.
    Symlink = 1 << 18,
    /// Entry is a named pipe.
    Fifo = 1 << 19,
    /// Entry is a socket.
    Socket = 1 << 20,
    /// Entry is a block or character device.
    Device = 1 << 21,
    /// Bitmask covering the Unix permission bits.
    PermissionMask = 0o7777,
    /// Bitmask covering every type bit.
    TypeMask = 0x3F << 16,
}

impl BitAnd<Flags> for Flags {
    type Output = u32;

    fn bitand(self, rhs: Flags) -> Self::Output {
        self as u32 & rhs
    }
}

impl BitAnd<u32> for Flags {
    type Output = u32;

    fn bitand(self, rhs: u32) -> Self::Output {
        self as u32 & rhs
    }
}

impl BitAnd<Flags> for u32 {
    type Output = u32;

    fn bitand(self, rhs: Flags) -> Self::Output {
        self & rhs as u32
    }
}

/// Computes the identifier for a relative path string.
pub fn path_id(path: &str) -> PathId {
    let mut hasher = Sha1::new();
    hasher.update(path.as_bytes());
    hasher.finalize().into()
}

/// Metadata record for one path in a snapshot.
///
/// Entries are value objects: the database hands out copies, and all
/// comparisons (diffing, duplicate detection, searching) work on the fields
/// below without touching the filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathEntry {
    /// SHA-1 identifier of the relative path.
    pub id: PathId,
    /// Relative path, forward-slash separated; `.` denotes the root.
    pub path: String,
    /// Size in bytes; 0 for anything that is not a regular file.
    pub size: u64,
    /// Permission bits plus type flags.
    pub mode: u32,
    /// Last-modification time, nanosecond precision, timezone-aware.
    pub mtime: DateTime<FixedOffset>,
}

impl PathEntry {
    pub fn new(path: String, size: u64, mode: u32, mtime: DateTime<FixedOffset>) -> Self {
        Self {
            id: path_id(&path),
            path,
            size,
            mode,
            mtime,
        }
    }

    /// Builds an entry from filesystem metadata.
    ///
    /// The size is recorded only for regular files; everything else stores 0.
    pub fn from_metadata(path: String, metadata: &Metadata) -> AjfsResult<Self> {
        let mode = mode_from_metadata(metadata);
        let size = if mode & Flags::File > 0 {
            metadata.len()
        } else {
            0
        };
        let mtime = DateTime::<Local>::from(metadata.modified()?).fixed_offset();
        Ok(Self::new(path, size, mode, mtime))
    }

    pub fn is_directory(&self) -> bool {
        self.mode & Flags::Directory > 0
    }

    pub fn is_file(&self) -> bool {
        self.mode & Flags::File > 0
    }

    pub fn is_symlink(&self) -> bool {
        self.mode & Flags::Symlink > 0
    }

    /// Single-character tag used in listings and diff reports.
    pub fn type_char(&self) -> char {
        if self.mode & Flags::Directory > 0 {
            'd'
        } else if self.mode & Flags::File > 0 {
            'f'
        } else if self.mode & Flags::Symlink > 0 {
            'l'
        } else if self.mode & Flags::Fifo > 0 {
            'p'
        } else if self.mode & Flags::Socket > 0 {
            's'
        } else if self.mode & Flags::Device > 0 {
            'b'
        } else {
            '?'
        }
    }

    /// Lower-case hex form of the identifier.
    pub fn id_hex(&self) -> String {
        hex::encode(self.id)
    }

    /// `rwxr-xr-x`-style rendering of the permission bits.
    pub fn permissions_string(&self) -> String {
        let perm = self.mode & Flags::PermissionMask;
        let mut out = String::with_capacity(9);
        for shift in [6u32, 3, 0] {
            let triplet = (perm >> shift) & 0o7;
            out.push(if triplet & 0o4 > 0 { 'r' } else { '-' });
            out.push(if triplet & 0o2 > 0 { 'w' } else { '-' });
            out.push(if triplet & 0o1 > 0 { 'x' } else { '-' });
        }
        out
    }

    /// Serializes the entry record: fixed sub-header (identifier, size, mode)
    /// followed by the length-prefixed mtime and path.
    pub fn write_record<W: Write>(&self, writer: &mut W) -> AjfsResult<()> {
        writer.write_all(&self.id)?;
        codec::write_u64(writer, self.size)?;
        codec::write_u32(writer, self.mode)?;
        codec::write_timestamp(writer, &self.mtime)?;
        codec::write_string(writer, &self.path)?;
        Ok(())
    }

    /// Deserializes one entry record.
    pub fn read_record<R: Read>(reader: &mut R) -> AjfsResult<Self> {
        let mut id = [0u8; ID_LEN];
        reader.read_exact(&mut id)?;
        let size = codec::read_u64(reader)?;
        let mode = codec::read_u32(reader)?;
        let mtime = codec::read_timestamp(reader)?;
        let path = codec::read_string(reader, MAX_PATH_LEN)?;
        Ok(Self {
            id,
            path,
            size,
            mode,
            mtime,
        })
    }
}

/// Derives the entry mode from filesystem metadata.
pub fn mode_from_metadata(metadata: &Metadata) -> u32 {
    let file_type = metadata.file_type();
    let mut mode = if file_type.is_dir() {
        Flags::Directory as u32
    } else if file_type.is_symlink() {
        Flags::Symlink as u32
    } else if file_type.is_file() {
        Flags::File as u32
    } else {
        special_type_bits(metadata)
    };
    mode |= permission_bits(metadata);
    mode
}

#[cfg(unix)]
fn permission_bits(metadata: &Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & Flags::PermissionMask as u32
}

#[cfg(not(unix))]
fn permission_bits(metadata: &Metadata) -> u32 {
    if metadata.permissions().readonly() {
        0o444
    } else {
        0o644
    }
}

#[cfg(unix)]
fn special_type_bits(metadata: &Metadata) -> u32 {
    use std::os::unix::fs::FileTypeExt;
    let file_type = metadata.file_type();
    if file_type.is_fifo() {
        Flags::Fifo as u32
    } else if file_type.is_socket() {
        Flags::Socket as u32
    } else if file_type.is_block_device() || file_type.is_char_device() {
        Flags::Device as u32
    } else {
        0
    }
}

#[cfg(not(unix))]
fn special_type_bits(_metadata: &Metadata) -> u32 {
    0
}
