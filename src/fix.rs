//! # Header Repair
//!
//! Re-derives every fixed-header field by replaying the file content and
//! compares the result against the stored header. Dry-run reports each
//! discrepancy (lines prefixed `>> `) and returns `NeedsFix`; apply mode
//! backs up the damaged header and rewrites it from the recomputed truth.
//!
//! Only the fixed header is ever repaired. A damaged signature or version
//! prefix, a torn entries region or a corrupt sentinel cannot be fixed and
//! surface as errors instead.

use std::fs::{File, OpenOptions};
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::Path;

use log::info;

use crate::codec;
use crate::common::{
    AjfsError, AjfsResult, HASH_SENTINEL, LOOKUP_SENTINEL,
};
use crate::database::DatabaseFile;
use crate::hashing::HashAlgorithm;
use crate::header::{Header, FEATURE_HASH_TABLE, HEADER_LEN, LOOKUP_ROW_LEN};
use crate::path_entry::PathEntry;

const MAX_ROOT_LEN: u64 = 4096;

fn read_header_bytes(file: &mut File) -> AjfsResult<[u8; HEADER_LEN]> {
    let mut buffer = [0u8; HEADER_LEN];
    file.seek(SeekFrom::Start(0))?;
    file.read_exact(&mut buffer)
        .map_err(|_| AjfsError::Truncated("file shorter than the header".into()))?;
    Ok(buffer)
}

/// Header derived by replaying a database file's content.
fn derive_header(file: &File, stored_version: u16, file_len: u64) -> AjfsResult<Header> {
    let mut reader = BufReader::new(file);
    reader.seek(SeekFrom::Start(HEADER_LEN as u64))?;
    // Root and meta records precede the entries region.
    codec::read_string(&mut reader, MAX_ROOT_LEN)?;
    codec::read_bytes(&mut reader, MAX_ROOT_LEN)?;
    codec::read_bytes(&mut reader, MAX_ROOT_LEN)?;
    codec::read_bytes(&mut reader, MAX_ROOT_LEN)?;
    codec::read_bytes(&mut reader, codec::TIMESTAMP_LEN as u64)?;
    let entries_offset = reader.stream_position()? as u32;

    // Count entry records up to the lookup-table sentinel.
    let mut entries_count = 0u32;
    let mut file_entries_count = 0u32;
    let lookup_offset;
    loop {
        let mut peek = [0u8; 4];
        reader.read_exact(&mut peek).map_err(|_| {
            AjfsError::Truncated("entries region ends without a lookup table".into())
        })?;
        if &peek == LOOKUP_SENTINEL {
            lookup_offset = reader.stream_position()? as u32;
            break;
        }
        reader.seek_relative(-4)?;
        let entry = PathEntry::read_record(&mut reader)?;
        entries_count += 1;
        if entry.is_file() {
            file_entries_count += 1;
        }
    }

    reader.seek_relative(entries_count as i64 * LOOKUP_ROW_LEN as i64)?;
    let mut sentinel = [0u8; 4];
    reader
        .read_exact(&mut sentinel)
        .map_err(|_| AjfsError::Truncated("lookup table is cut short".into()))?;
    if &sentinel != LOOKUP_SENTINEL {
        return Err(AjfsError::InvalidFormat(
            "corrupted sentinel after the lookup table".into(),
        ));
    }
    let features_offset = reader.stream_position()? as u32;

    // An AJHX block directly after the features region marks the hash table.
    let mut feature_flags = 0u16;
    let mut hash_table_offset = 0u32;
    let mut probe = [0u8; 4];
    match reader.read_exact(&mut probe) {
        Err(_) => {}
        Ok(()) => {
            if &probe != HASH_SENTINEL {
                return Err(AjfsError::InvalidFormat(
                    "unexpected data after the features region".into(),
                ));
            }
            let mut tag = [0u8; 1];
            reader.read_exact(&mut tag)?;
            let algorithm = HashAlgorithm::from_tag(tag[0])?;
            let slot_count = codec::read_u32(&mut reader)?;
            if slot_count != file_entries_count {
                return Err(AjfsError::InvalidFormat(format!(
                    "hash table holds {slot_count} slots for {file_entries_count} file entries"
                )));
            }
            let slot_len = (4 + algorithm.digest_len()) as i64;
            reader.seek_relative(slot_count as i64 * slot_len)?;
            reader.read_exact(&mut sentinel).map_err(|_| {
                AjfsError::Truncated("hash table is cut short".into())
            })?;
            if &sentinel != HASH_SENTINEL {
                return Err(AjfsError::InvalidFormat(
                    "corrupted sentinel after the hash table".into(),
                ));
            }
            feature_flags = FEATURE_HASH_TABLE;
            hash_table_offset = features_offset;
        }
    }

    let checksum_end = if hash_table_offset > 0 {
        hash_table_offset as u64
    } else {
        file_len
    };
    let checksum = checksum_span(file, HEADER_LEN as u64, checksum_end)?;

    Ok(Header {
        version: stored_version,
        entries_count,
        file_entries_count,
        entries_offset,
        lookup_offset,
        features_offset,
        hash_table_offset,
        feature_flags,
        checksum,
    })
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

fn report_field<W: Write + ?Sized>(
    report: &mut W,
    name: &str,
    stored: u32,
    expected: u32,
) -> AjfsResult<bool> {
    if stored == expected {
        return Ok(false);
    }
    writeln!(report, ">> {name}: recorded {stored}, expected {expected}")?;
    Ok(true)
}

/// Verifies the stored header against the replayed truth.
///
/// Every discrepancy is written to `report` as a `>> ` line. In dry-run
/// mode a damaged header yields [`AjfsError::NeedsFix`]; otherwise the
/// original header bytes are saved to `backup_path` and the header is
/// rewritten, flushed and fsynced.
pub fn fix(
    db_path: &Path,
    report: &mut dyn Write,
    dry_run: bool,
    backup_path: &Path,
) -> AjfsResult<()> {
    let mut file = File::open(db_path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => AjfsError::NotFound(db_path.display().to_string()),
        _ => AjfsError::from(e),
    })?;
    let file_len = file.metadata()?.len();
    let header_bytes = read_header_bytes(&mut file)?;
    let stored = Header::decode(&header_bytes)?;
    let expected = derive_header(&file, stored.version, file_len)?;
    drop(file);

    let mut damaged = false;
    damaged |= report_field(report, "entries-count", stored.entries_count, expected.entries_count)?;
    damaged |= report_field(
        report,
        "file-entries-count",
        stored.file_entries_count,
        expected.file_entries_count,
    )?;
    damaged |= report_field(report, "entries-offset", stored.entries_offset, expected.entries_offset)?;
    damaged |= report_field(
        report,
        "entries-lookup-table-offset",
        stored.lookup_offset,
        expected.lookup_offset,
    )?;
    damaged |= report_field(report, "features-offset", stored.features_offset, expected.features_offset)?;
    damaged |= report_field(
        report,
        "hash-table-offset",
        stored.hash_table_offset,
        expected.hash_table_offset,
    )?;
    damaged |= report_field(
        report,
        "feature-flags",
        stored.feature_flags as u32,
        expected.feature_flags as u32,
    )?;
    damaged |= report_field(report, "checksum", stored.checksum, expected.checksum)?;

    if !damaged {
        info!("database {} is healthy", db_path.display());
        return Ok(());
    }
    if dry_run {
        return Err(AjfsError::NeedsFix);
    }

    let mut backup = File::create(backup_path)?;
    backup.write_all(&header_bytes)?;
    backup.sync_all()?;

    let mut db_file = OpenOptions::new().write(true).open(db_path)?;
    db_file.write_all(&expected.encode())?;
    db_file.sync_all()?;
    info!(
        "rewrote header of {} (backup at {})",
        db_path.display(),
        backup_path.display()
    );
    Ok(())
}

/// Copies a previously backed-up header into the database. Both files must
/// start with a readable AJFS prefix.
pub fn restore_header(db_path: &Path, backup_path: &Path) -> AjfsResult<()> {
    let backup_bytes = read_header_bytes(&mut File::open(backup_path)?)?;
    Header::decode(&backup_bytes)?;

    let mut db_file = OpenOptions::new().read(true).write(true).open(db_path)?;
    let db_bytes = read_header_bytes(&mut db_file)?;
    Header::decode(&db_bytes)?;

    db_file.seek(SeekFrom::Start(0))?;
    db_file.write_all(&backup_bytes)?;
    db_file.sync_all()?;
    info!(
        "restored header of {} from {}",
        db_path.display(),
        backup_path.display()
    );
    Ok(())
}

/// Convenience check used by drivers: whether `path` opens cleanly.
pub fn verify(path: &Path) -> AjfsResult<()> {
    let mut db = DatabaseFile::open(path)?;
    db.close()
}
