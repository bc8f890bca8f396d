//! # Database Header
//!
//! The fixed-size header at the front of every database file. The first six
//! bytes are the `AJFS` signature and the little-endian format version; the
//! remainder holds the counts, region offsets, feature flags and the CRC32
//! checksum covering everything that never changes after creation.
//!
//! The header is rewritten exactly once per writer session (at close time)
//! and is the only region of the file the `fix` operation will repair.

use crate::common::{AjfsError, AjfsResult, FILE_SIGNATURE, SUPPORTED_VERSION};
use crate::path_entry::ID_LEN;

/// Bytes occupied by the signature and version prefix.
pub const PREFIX_LEN: usize = 6;
/// Total bytes occupied by the prefix plus the fixed header.
pub const HEADER_LEN: usize = 48;
/// Bytes per row of the entries lookup table (identifier + file offset).
pub const LOOKUP_ROW_LEN: usize = ID_LEN + 4;

/// Feature bit: the file carries a pre-allocated hash-table block.
pub const FEATURE_HASH_TABLE: u16 = 1 << 0;

/// Decoded form of the fixed header.
///
/// All integers are stored little-endian at fixed positions; the twelve
/// trailing reserved bytes are written as zero and ignored on read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub version: u16,
    pub entries_count: u32,
    pub file_entries_count: u32,
    pub entries_offset: u32,
    pub lookup_offset: u32,
    pub features_offset: u32,
    pub hash_table_offset: u32,
    pub feature_flags: u16,
    pub checksum: u32,
}

impl Header {
    /// Fresh header for a database being created.
    pub fn new(feature_flags: u16) -> Self {
        Self {
            version: SUPPORTED_VERSION,
            entries_count: 0,
            file_entries_count: 0,
            entries_offset: 0,
            lookup_offset: 0,
            features_offset: 0,
            hash_table_offset: 0,
            feature_flags,
            checksum: 0,
        }
    }

    pub fn has_hash_table(&self) -> bool {
        self.feature_flags & FEATURE_HASH_TABLE > 0
    }

    /// Serializes the prefix and fixed header into their on-disk form.
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut buffer = [0u8; HEADER_LEN];
        buffer[0..4].copy_from_slice(FILE_SIGNATURE);
        buffer[4..6].copy_from_slice(&self.version.to_le_bytes());
        buffer[6..10].copy_from_slice(&self.entries_count.to_le_bytes());
        buffer[10..14].copy_from_slice(&self.file_entries_count.to_le_bytes());
        buffer[14..18].copy_from_slice(&self.entries_offset.to_le_bytes());
        buffer[18..22].copy_from_slice(&self.lookup_offset.to_le_bytes());
        buffer[22..26].copy_from_slice(&self.features_offset.to_le_bytes());
        buffer[26..30].copy_from_slice(&self.hash_table_offset.to_le_bytes());
        buffer[30..32].copy_from_slice(&self.feature_flags.to_le_bytes());
        buffer[32..36].copy_from_slice(&self.checksum.to_le_bytes());
        buffer
    }

    /// Parses the prefix and fixed header, verifying the signature and that
    /// the format version is one this build can read.
    pub fn decode(buffer: &[u8]) -> AjfsResult<Self> {
        if buffer.len() < HEADER_LEN {
            return Err(AjfsError::Truncated(format!(
                "header has {} bytes, expected {HEADER_LEN}",
                buffer.len()
            )));
        }
        if &buffer[0..4] != FILE_SIGNATURE {
            return Err(AjfsError::InvalidFormat("bad file signature".into()));
        }
        let version = u16::from_le_bytes([buffer[4], buffer[5]]);
        if version > SUPPORTED_VERSION {
            return Err(AjfsError::InvalidFormat(format!(
                "unsupported format version {version} (max {SUPPORTED_VERSION})"
            )));
        }
        let field =
            |at: usize| u32::from_le_bytes([buffer[at], buffer[at + 1], buffer[at + 2], buffer[at + 3]]);
        Ok(Self {
            version,
            entries_count: field(6),
            file_entries_count: field(10),
            entries_offset: field(14),
            lookup_offset: field(18),
            features_offset: field(22),
            hash_table_offset: field(26),
            feature_flags: u16::from_le_bytes([buffer[30], buffer[31]]),
            checksum: field(32),
        })
    }

    /// Checks that the header offsets are internally consistent and point
    /// inside a file of `file_len` bytes.
    pub fn validate(&self, file_len: u64) -> AjfsResult<()> {
        let bad = |what: &str| Err(AjfsError::InvalidFormat(format!("header: {what}")));
        if (self.entries_offset as usize) < HEADER_LEN {
            return bad("entries offset overlaps the header");
        }
        if self.entries_offset > self.lookup_offset {
            return bad("entries region starts after the lookup table");
        }
        let table_len = self.entries_count as u64 * LOOKUP_ROW_LEN as u64;
        let expected_features = self.lookup_offset as u64 + table_len + 4;
        if self.features_offset as u64 != expected_features {
            return bad("features offset inconsistent with the lookup table span");
        }
        if self.features_offset as u64 > file_len {
            return bad("features offset beyond end of file");
        }
        if self.has_hash_table() {
            if self.hash_table_offset < self.features_offset {
                return bad("hash table offset before the features region");
            }
            if self.hash_table_offset as u64 > file_len {
                return bad("hash table offset beyond end of file");
            }
        } else if self.hash_table_offset != 0 {
            return bad("hash table offset set without the feature flag");
        }
        Ok(())
    }
}
