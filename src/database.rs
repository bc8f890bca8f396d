//! # Snapshot Database File
//!
//! This module implements the single-file snapshot database: a write-once,
//! read-many binary file holding the metadata of every path captured from a
//! root directory, optionally augmented with a content-hash table.
//!
//! ## File layout
//!
//! ```text
//! [0]   prefix + fixed header  (48 bytes, see `header`)
//!       root record            var-length UTF-8 absolute root path
//!       meta record            OS tag, arch tag, tool id, creation time
//!       entries region         N x variable-length entry record
//!       sentinel "AJCC"
//!       lookup table           N x (identifier + file offset)
//!       sentinel "AJCC"
//!       features trailer       reserved (currently empty)
//! [opt] hash-table block       "AJHX" framed, fixed-size digest slots
//! ```
//!
//! ## Lifecycle
//!
//! A handle moves through `WritingEntries -> EntriesFinished ->
//! [WritingHashTable -> HashTableFinished] -> Closed` when creating,
//! `Reading -> Closed` when opened read-only, or `ResumingHashes -> Closed`
//! when reopened to fill remaining hash slots. Calling an operation out of
//! order is a programming error and panics; mixing reader and writer
//! operations on one handle reports [`AjfsError::ModeMismatch`].
//!
//! The only in-place mutations permitted after creation are overwriting
//! pre-allocated hash slots and rewriting the fixed-size header at close
//! time. The CRC32 checksum covers every byte between the fixed header and
//! the hash block, which is exactly the region that never changes after
//! `finish_entries`.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset, Local};
use log::debug;

use crate::codec;
use crate::common::{
    absolutize_path, AjfsError, AjfsResult, Visit, HASH_SENTINEL, LOOKUP_SENTINEL,
};
use crate::hashing::HashAlgorithm;
use crate::header::{Header, HEADER_LEN, LOOKUP_ROW_LEN};
use crate::path_entry::{PathEntry, PathId, ID_LEN};

/// Upper bound accepted for the root-path and meta-record string fields.
const MAX_META_FIELD_LEN: u64 = 4096;

/// Lifecycle states of a database handle.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DbState {
    WritingEntries,
    EntriesFinished,
    WritingHashTable,
    HashTableFinished,
    Reading,
    ResumingHashes,
    Closed,
}

/// Provenance record written right after the root path: which machine and
/// tool produced the snapshot, and when.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaRecord {
    pub os: String,
    pub arch: String,
    pub tool: String,
    pub created: DateTime<FixedOffset>,
}

impl MetaRecord {
    pub fn new() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            tool: format!("ajfs {}", env!("CARGO_PKG_VERSION")),
            created: Local::now().fixed_offset(),
        }
    }

    fn write<W: Write>(&self, writer: &mut W) -> AjfsResult<()> {
        codec::write_string(writer, &self.os)?;
        codec::write_string(writer, &self.arch)?;
        codec::write_string(writer, &self.tool)?;
        codec::write_timestamp(writer, &self.created)?;
        Ok(())
    }

    fn read<R: Read>(reader: &mut R) -> AjfsResult<Self> {
        Ok(Self {
            os: codec::read_string(reader, MAX_META_FIELD_LEN)?,
            arch: codec::read_string(reader, MAX_META_FIELD_LEN)?,
            tool: codec::read_string(reader, MAX_META_FIELD_LEN)?,
            created: codec::read_timestamp(reader)?,
        })
    }
}

impl Default for MetaRecord {
    fn default() -> Self {
        Self::new()
    }
}

/// One snapshot database file and its in-memory offset tables.
///
/// The handle owns the open file descriptor exclusively; entries handed to
/// callers are copies.
#[derive(Debug)]
pub struct DatabaseFile {
    path: PathBuf,
    file: File,
    state: DbState,
    header: Header,
    root: String,
    meta: MetaRecord,
    /// Entry index -> file offset of the entry record.
    offsets: Vec<u32>,
    /// Entry index -> identifier, mirroring the on-disk lookup table.
    ids: Vec<PathId>,
    /// Indexes of regular-file entries, in insertion order.
    file_entry_indexes: Vec<u32>,
    hash_algorithm: Option<HashAlgorithm>,
    /// Entry index -> file offset of its pre-allocated digest slot.
    hash_slot_offsets: HashMap<u32, u64>,
}

impl DatabaseFile {
    /// Creates a new database file, failing with `AlreadyExists` if the path
    /// is taken. The root is stored absolutized; the feature set chosen here
    /// is final.
    pub fn create(path: &Path, root: &Path, feature_flags: u16) -> AjfsResult<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::AlreadyExists => {
                    AjfsError::AlreadyExists(path.display().to_string())
                }
                _ => e.into(),
            })?;
        let root = absolutize_path(root).to_string_lossy().into_owned();
        let meta = MetaRecord::new();
        let mut header = Header::new(feature_flags);
        file.write_all(&header.encode())?;
        let mut preamble = Vec::new();
        codec::write_string(&mut preamble, &root)?;
        meta.write(&mut preamble)?;
        file.write_all(&preamble)?;
        header.entries_offset = (HEADER_LEN + preamble.len()) as u32;
        debug!("created database {} (root {root})", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            file,
            state: DbState::WritingEntries,
            header,
            root,
            meta,
            offsets: Vec::new(),
            ids: Vec::new(),
            file_entry_indexes: Vec::new(),
            hash_algorithm: None,
            hash_slot_offsets: HashMap::new(),
        })
    }

    /// Opens an existing database read-only, verifying the signature,
    /// version, header consistency, lookup-table sentinels and checksum.
    pub fn open(path: &Path) -> AjfsResult<Self> {
        let file = File::open(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => AjfsError::NotFound(path.display().to_string()),
            _ => e.into(),
        })?;
        Self::open_with(path, file, DbState::Reading)
    }

    /// Reopens an existing database read-write to continue filling hash
    /// slots. Replays the hash block to rebuild the slot map.
    pub fn resume_database(path: &Path) -> AjfsResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => AjfsError::NotFound(path.display().to_string()),
                _ => e.into(),
            })?;
        let mut db = Self::open_with(path, file, DbState::ResumingHashes)?;
        if !db.header.has_hash_table() || db.header.hash_table_offset == 0 {
            return Err(AjfsError::InvalidFormat(
                "database has no hash table to resume".into(),
            ));
        }
        db.replay_hash_slots()?;
        Ok(db)
    }

    fn open_with(path: &Path, mut file: File, state: DbState) -> AjfsResult<Self> {
        let file_len = file.metadata()?.len();
        let mut header_bytes = [0u8; HEADER_LEN];
        file.seek(SeekFrom::Start(0))?;
        file.read_exact(&mut header_bytes)
            .map_err(|_| AjfsError::Truncated("file shorter than the header".into()))?;
        let header = Header::decode(&header_bytes)?;
        header.validate(file_len)?;

        let mut reader = BufReader::new(&file);
        reader.seek(SeekFrom::Start(HEADER_LEN as u64))?;
        let root = codec::read_string(&mut reader, MAX_META_FIELD_LEN)?;
        let meta = MetaRecord::read(&mut reader)?;

        // Lookup table, framed by sentinels on both sides.
        let mut ids = Vec::with_capacity(header.entries_count as usize);
        let mut offsets = Vec::with_capacity(header.entries_count as usize);
        reader.seek(SeekFrom::Start(header.lookup_offset as u64 - 4))?;
        Self::expect_sentinel(&mut reader, LOOKUP_SENTINEL, "before the lookup table")?;
        for _ in 0..header.entries_count {
            let mut id = [0u8; ID_LEN];
            reader.read_exact(&mut id)?;
            ids.push(id);
            offsets.push(codec::read_u32(&mut reader)?);
        }
        Self::expect_sentinel(&mut reader, LOOKUP_SENTINEL, "after the lookup table")?;

        let checksum_end = if header.has_hash_table() && header.hash_table_offset > 0 {
            header.hash_table_offset as u64
        } else {
            file_len
        };
        let computed = Self::checksum_span(&file, HEADER_LEN as u64, checksum_end)?;
        if computed != header.checksum {
            return Err(AjfsError::ChecksumMismatch {
                stored: header.checksum,
                computed,
            });
        }

        let mut db = Self {
            path: path.to_path_buf(),
            file,
            state,
            header,
            root,
            meta,
            offsets,
            ids,
            file_entry_indexes: Vec::new(),
            hash_algorithm: None,
            hash_slot_offsets: HashMap::new(),
        };
        if db.header.has_hash_table() && db.header.hash_table_offset > 0 {
            db.read_hash_block_header()?;
        }
        debug!(
            "opened database {} ({} entries, {} files)",
            path.display(),
            db.header.entries_count,
            db.header.file_entries_count
        );
        Ok(db)
    }

    fn expect_sentinel<R: Read>(reader: &mut R, sentinel: &[u8; 4], at: &str) -> AjfsResult<()> {
        let mut buffer = [0u8; 4];
        reader
            .read_exact(&mut buffer)
            .map_err(|_| AjfsError::Truncated(format!("missing sentinel {at}")))?;
        if &buffer != sentinel {
            return Err(AjfsError::InvalidFormat(format!("corrupted sentinel {at}")));
        }
        Ok(())
    }

    fn checksum_span(file: &File, start: u64, end: u64) -> AjfsResult<u32> {
        let mut reader = BufReader::new(file);
        reader.seek(SeekFrom::Start(start))?;
        let mut hasher = crc32fast::Hasher::new();
        let mut remaining = end.saturating_sub(start);
        let mut buffer = [0u8; 64 * 1024];
        while remaining > 0 {
            let want = remaining.min(buffer.len() as u64) as usize;
            reader.read_exact(&mut buffer[..want])?;
            hasher.update(&buffer[..want]);
            remaining -= want as u64;
        }
        Ok(hasher.finalize())
    }

    fn expect_state(&self, allowed: &[DbState], op: &str) -> AjfsResult<()> {
        if allowed.contains(&self.state) {
            return Ok(());
        }
        match self.state {
            DbState::Reading => Err(AjfsError::ModeMismatch("read-only")),
            DbState::WritingEntries | DbState::EntriesFinished | DbState::WritingHashTable => {
                Err(AjfsError::ModeMismatch("write"))
            }
            _ => panic!("{op} called in {:?} state", self.state),
        }
    }

    /// Appends one entry. Valid only while writing entries.
    pub fn write_entry(&mut self, entry: &PathEntry) -> AjfsResult<u32> {
        self.expect_state(&[DbState::WritingEntries], "write_entry")?;
        let offset = self.file.seek(SeekFrom::End(0))?;
        let mut record = Vec::with_capacity(64 + entry.path.len());
        entry.write_record(&mut record)?;
        self.file.write_all(&record)?;
        let index = self.header.entries_count;
        self.offsets.push(offset as u32);
        self.ids.push(entry.id);
        self.header.entries_count += 1;
        if entry.is_file() {
            self.header.file_entries_count += 1;
            self.file_entry_indexes.push(index);
        }
        Ok(index)
    }

    /// Writes the lookup table (insertion order) framed by its sentinels and
    /// fixes up the header offsets. Transitions to `EntriesFinished`.
    pub fn finish_entries(&mut self) -> AjfsResult<()> {
        self.expect_state(&[DbState::WritingEntries], "finish_entries")?;
        let sentinel_at = self.file.seek(SeekFrom::End(0))?;
        let mut block = Vec::with_capacity(8 + self.ids.len() * LOOKUP_ROW_LEN);
        block.extend_from_slice(LOOKUP_SENTINEL);
        for (id, offset) in self.ids.iter().zip(&self.offsets) {
            block.extend_from_slice(id);
            block.extend_from_slice(&offset.to_le_bytes());
        }
        block.extend_from_slice(LOOKUP_SENTINEL);
        self.file.write_all(&block)?;
        self.header.lookup_offset = sentinel_at as u32 + 4;
        self.header.features_offset = (sentinel_at as usize + block.len()) as u32;
        self.state = DbState::EntriesFinished;
        debug!(
            "finished entries: {} total, {} files",
            self.header.entries_count, self.header.file_entries_count
        );
        Ok(())
    }

    /// Pre-allocates the hash block: one zero-filled, fixed-size slot per
    /// regular-file entry in file-entry order. Slots are overwritten in place
    /// later; the block never grows.
    pub fn start_hash_table(&mut self, algorithm: HashAlgorithm) -> AjfsResult<()> {
        self.expect_state(&[DbState::EntriesFinished], "start_hash_table")?;
        assert!(
            self.header.has_hash_table(),
            "start_hash_table called without the hash-table feature"
        );
        let block_start = self.file.seek(SeekFrom::End(0))?;
        let digest_len = algorithm.digest_len();
        let mut block =
            Vec::with_capacity(13 + self.file_entry_indexes.len() * (4 + digest_len));
        block.extend_from_slice(HASH_SENTINEL);
        block.push(algorithm as u8);
        block.extend_from_slice(&(self.file_entry_indexes.len() as u32).to_le_bytes());
        for index in &self.file_entry_indexes {
            let slot_offset = block_start + block.len() as u64 + 4;
            block.extend_from_slice(&index.to_le_bytes());
            block.extend(std::iter::repeat(0u8).take(digest_len));
            self.hash_slot_offsets.insert(*index, slot_offset);
        }
        block.extend_from_slice(HASH_SENTINEL);
        self.file.write_all(&block)?;
        self.file.sync_data()?;
        self.header.hash_table_offset = block_start as u32;
        self.hash_algorithm = Some(algorithm);
        self.state = DbState::WritingHashTable;
        Ok(())
    }

    /// Overwrites the pre-allocated slot for `entry_index` with `digest`.
    pub fn write_hash_entry(&mut self, entry_index: u32, digest: &[u8]) -> AjfsResult<()> {
        self.expect_state(
            &[DbState::WritingHashTable, DbState::ResumingHashes],
            "write_hash_entry",
        )?;
        let algorithm = self
            .hash_algorithm
            .expect("hash algorithm must be set while writing hashes");
        assert_eq!(
            digest.len(),
            algorithm.digest_len(),
            "digest length does not match the {algorithm} algorithm"
        );
        let slot_offset = *self
            .hash_slot_offsets
            .get(&entry_index)
            .unwrap_or_else(|| panic!("no hash slot for entry index {entry_index}"));
        self.file.seek(SeekFrom::Start(slot_offset))?;
        self.file.write_all(digest)?;
        Ok(())
    }

    /// Marks the hash table complete.
    pub fn finish_hash_table(&mut self) -> AjfsResult<()> {
        self.expect_state(&[DbState::WritingHashTable], "finish_hash_table")?;
        self.file.sync_data()?;
        self.state = DbState::HashTableFinished;
        Ok(())
    }

    /// Forces buffered slot writes to disk so an interrupt leaves the
    /// database resumable.
    pub fn flush(&mut self) -> AjfsResult<()> {
        self.file.sync_data()?;
        Ok(())
    }

    /// Flushes outstanding writes and closes the handle. In a writer session
    /// the header is rewritten with the final counts, offsets and a freshly
    /// computed checksum.
    pub fn close(&mut self) -> AjfsResult<()> {
        match self.state {
            DbState::Closed => return Ok(()),
            DbState::Reading => {
                self.state = DbState::Closed;
                return Ok(());
            }
            DbState::ResumingHashes => {
                self.file.sync_data()?;
                self.state = DbState::Closed;
                return Ok(());
            }
            DbState::WritingEntries
            | DbState::EntriesFinished
            | DbState::WritingHashTable
            | DbState::HashTableFinished => {}
        }
        let file_len = self.file.seek(SeekFrom::End(0))?;
        let checksum_end = if self.header.hash_table_offset > 0 {
            self.header.hash_table_offset as u64
        } else {
            file_len
        };
        self.header.checksum = Self::checksum_span(&self.file, HEADER_LEN as u64, checksum_end)?;
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&self.header.encode())?;
        self.file.sync_all()?;
        self.state = DbState::Closed;
        debug!("closed database {}", self.path.display());
        Ok(())
    }

    /// Reads the entry at `index` through the lookup table.
    pub fn read_entry_at(&mut self, index: u32) -> AjfsResult<PathEntry> {
        self.readable("read_entry_at")?;
        let offset = *self
            .offsets
            .get(index as usize)
            .ok_or_else(|| AjfsError::NotFound(format!("entry index {index}")))?;
        self.file.seek(SeekFrom::Start(offset as u64))?;
        let mut reader = BufReader::new(&self.file);
        PathEntry::read_record(&mut reader)
    }

    /// Streams every entry in insertion order, invoking `visit(index, entry)`.
    /// Returning [`Visit::SkipAll`] stops the iteration cleanly.
    pub fn read_all_entries<F>(&mut self, mut visit: F) -> AjfsResult<()>
    where
        F: FnMut(u32, PathEntry) -> AjfsResult<Visit>,
    {
        self.readable("read_all_entries")?;
        let count = self.header.entries_count;
        self.file
            .seek(SeekFrom::Start(self.header.entries_offset as u64))?;
        let mut reader = BufReader::new(&self.file);
        for index in 0..count {
            let entry = PathEntry::read_record(&mut reader)?;
            if visit(index, entry)? == Visit::SkipAll {
                break;
            }
        }
        Ok(())
    }

    fn readable(&self, op: &str) -> AjfsResult<()> {
        self.expect_state(
            &[
                DbState::Reading,
                DbState::ResumingHashes,
                DbState::WritingHashTable,
                DbState::HashTableFinished,
            ],
            op,
        )
    }

    fn read_hash_block_header(&mut self) -> AjfsResult<()> {
        self.file
            .seek(SeekFrom::Start(self.header.hash_table_offset as u64))?;
        let mut reader = BufReader::new(&self.file);
        Self::expect_sentinel(&mut reader, HASH_SENTINEL, "before the hash table")?;
        let mut tag = [0u8; 1];
        reader.read_exact(&mut tag)?;
        let algorithm = HashAlgorithm::from_tag(tag[0])?;
        let count = codec::read_u32(&mut reader)?;
        if count != self.header.file_entries_count {
            return Err(AjfsError::InvalidFormat(format!(
                "hash table holds {count} slots for {} file entries",
                self.header.file_entries_count
            )));
        }
        // Skip the slots and verify the closing sentinel.
        let slot_len = (4 + algorithm.digest_len()) as u64;
        reader.seek(SeekFrom::Current(count as i64 * slot_len as i64))?;
        Self::expect_sentinel(&mut reader, HASH_SENTINEL, "after the hash table")?;
        self.hash_algorithm = Some(algorithm);
        Ok(())
    }

    /// Walks the hash block and returns every slot as
    /// `(entry index, slot offset, digest)`.
    fn read_hash_slots(&mut self) -> AjfsResult<Vec<(u32, u64, Vec<u8>)>> {
        let algorithm = self.hash_algorithm.ok_or_else(|| {
            AjfsError::InvalidFormat("database has no hash table".into())
        })?;
        let digest_len = algorithm.digest_len();
        let count = self.header.file_entries_count as usize;
        let slots_start = self.header.hash_table_offset as u64 + 9;
        self.file.seek(SeekFrom::Start(slots_start))?;
        let mut reader = BufReader::new(&self.file);
        let mut slots = Vec::with_capacity(count);
        for slot in 0..count {
            let index = codec::read_u32(&mut reader)?;
            let mut digest = vec![0u8; digest_len];
            reader.read_exact(&mut digest)?;
            let offset = slots_start + slot as u64 * (4 + digest_len) as u64 + 4;
            slots.push((index, offset, digest));
        }
        Ok(slots)
    }

    fn replay_hash_slots(&mut self) -> AjfsResult<()> {
        let slots = self.read_hash_slots()?;
        self.file_entry_indexes = slots.iter().map(|(index, _, _)| *index).collect();
        self.hash_slot_offsets = slots
            .into_iter()
            .map(|(index, offset, _)| (index, offset))
            .collect();
        Ok(())
    }

    /// Returns the filled hash slots as an entry-index -> digest map.
    /// All-zero slots (not yet computed) are skipped.
    pub fn read_hash_table(&mut self) -> AjfsResult<HashMap<u32, Vec<u8>>> {
        self.readable("read_hash_table")?;
        Ok(self
            .read_hash_slots()?
            .into_iter()
            .filter(|(_, _, digest)| digest.iter().any(|b| *b != 0))
            .map(|(index, _, digest)| (index, digest))
            .collect())
    }

    /// Invokes `visit(index, entry)` for every regular file whose hash slot
    /// is still zeroed.
    pub fn entries_need_hashing<F>(&mut self, mut visit: F) -> AjfsResult<()>
    where
        F: FnMut(u32, PathEntry) -> AjfsResult<Visit>,
    {
        self.readable("entries_need_hashing")?;
        let pending: Vec<u32> = self
            .read_hash_slots()?
            .into_iter()
            .filter(|(_, _, digest)| digest.iter().all(|b| *b == 0))
            .map(|(index, _, _)| index)
            .collect();
        for index in pending {
            let entry = self.read_entry_at(index)?;
            if visit(index, entry)? == Visit::SkipAll {
                break;
            }
        }
        Ok(())
    }

    /// Buckets filled hash slots by digest and drops singletons.
    pub fn find_duplicate_hashes(&mut self) -> AjfsResult<HashMap<Vec<u8>, Vec<u32>>> {
        let mut buckets: HashMap<Vec<u8>, Vec<u32>> = HashMap::new();
        for (index, digest) in self.read_hash_table()? {
            buckets.entry(digest).or_default().push(index);
        }
        buckets.retain(|_, indexes| indexes.len() > 1);
        for indexes in buckets.values_mut() {
            indexes.sort_unstable();
        }
        Ok(buckets)
    }

    /// Enumerates duplicate groups deterministically (hex-digest ascending,
    /// then entry index), invoking `visit(group, index, entry, hex digest)`.
    pub fn find_duplicates<F>(&mut self, mut visit: F) -> AjfsResult<()>
    where
        F: FnMut(u32, u32, PathEntry, &str) -> AjfsResult<Visit>,
    {
        let buckets = self.find_duplicate_hashes()?;
        let mut groups: Vec<(String, Vec<u32>)> = buckets
            .into_iter()
            .map(|(digest, indexes)| (hex::encode(digest), indexes))
            .collect();
        groups.sort_by(|a, b| a.0.cmp(&b.0));
        'outer: for (group, (digest_hex, indexes)) in groups.into_iter().enumerate() {
            for index in indexes {
                let entry = self.read_entry_at(index)?;
                if visit(group as u32, index, entry, &digest_hex)? == Visit::SkipAll {
                    break 'outer;
                }
            }
        }
        Ok(())
    }

    /// Joins entries with their filled hash slots, in entry order. Entries
    /// without a digest are omitted.
    pub fn read_entries_with_hashes<F>(&mut self, mut visit: F) -> AjfsResult<()>
    where
        F: FnMut(u32, PathEntry, &[u8]) -> AjfsResult<Visit>,
    {
        let hashes = self.read_hash_table()?;
        let mut indexes: Vec<u32> = hashes.keys().copied().collect();
        indexes.sort_unstable();
        for index in indexes {
            let entry = self.read_entry_at(index)?;
            let digest = &hashes[&index];
            if visit(index, entry, digest)? == Visit::SkipAll {
                break;
            }
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn meta(&self) -> &MetaRecord {
        &self.meta
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn state(&self) -> DbState {
        self.state
    }

    pub fn entries_count(&self) -> u32 {
        self.header.entries_count
    }

    pub fn file_entries_count(&self) -> u32 {
        self.header.file_entries_count
    }

    pub fn has_hash_table(&self) -> bool {
        self.header.has_hash_table() && self.header.hash_table_offset > 0
    }

    pub fn hash_algorithm(&self) -> Option<HashAlgorithm> {
        self.hash_algorithm
    }

    /// Identifier of the entry at `index`, from the in-memory lookup table.
    pub fn id_at(&self, index: u32) -> Option<&PathId> {
        self.ids.get(index as usize)
    }
}

impl Drop for DatabaseFile {
    fn drop(&mut self) {
        if self.state != DbState::Closed {
            if let Err(e) = self.close() {
                log::warn!("failed to close database {}: {e}", self.path.display());
            }
        }
    }
}
