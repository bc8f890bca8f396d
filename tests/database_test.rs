mod common;

use std::fs;
use std::io::{Read, Seek, SeekFrom, Write};

use ajfs::common::{AjfsError, AjfsResult, Visit};
use ajfs::database::DatabaseFile;
use ajfs::hashing::HashAlgorithm;
use ajfs::stats::{calculate_hash_table_stats, calculate_stats};

use common::{build_db, build_hashed_db, dir_entry, fake_digest, file_entry};

fn sample_entries() -> Vec<ajfs::path_entry::PathEntry> {
    vec![
        dir_entry("."),
        dir_entry("docs"),
        file_entry("docs/readme.md", 1024),
        file_entry("docs/todo.md", 42),
        dir_entry("src"),
        file_entry("src/main.rs", 4096),
    ]
}

#[test]
fn test_round_trip() -> AjfsResult<()> {
    let dir = tempfile::tempdir()?;
    let db_path = dir.path().join("db.ajfs");
    let entries = sample_entries();
    build_db(&db_path, dir.path(), &entries)?;

    let mut db = DatabaseFile::open(&db_path)?;
    assert_eq!(entries.len() as u32, db.entries_count());
    assert_eq!(3, db.file_entries_count());
    assert!(!db.has_hash_table());

    let mut seen = Vec::new();
    let mut last_index = None;
    db.read_all_entries(|index, entry| {
        if let Some(last) = last_index {
            assert_eq!(last + 1, index);
        } else {
            assert_eq!(0, index);
        }
        last_index = Some(index);
        seen.push(entry);
        Ok(Visit::Continue)
    })?;
    assert_eq!(entries, seen);

    // Random access through the lookup table must agree with the stream.
    for (index, expected) in entries.iter().enumerate() {
        assert_eq!(*expected, db.read_entry_at(index as u32)?);
    }
    db.close()
}

#[test]
fn test_open_reproduces_root_and_meta() -> AjfsResult<()> {
    let dir = tempfile::tempdir()?;
    let db_path = dir.path().join("db.ajfs");
    build_db(&db_path, dir.path(), &sample_entries())?;

    let mut db = DatabaseFile::open(&db_path)?;
    let root = dir.path().canonicalize()?;
    assert_eq!(root.to_string_lossy(), db.root());
    assert_eq!(std::env::consts::OS, db.meta().os);
    assert_eq!(std::env::consts::ARCH, db.meta().arch);
    assert!(db.meta().tool.starts_with("ajfs "));
    db.close()
}

#[test]
fn test_create_fails_when_file_exists() -> AjfsResult<()> {
    let dir = tempfile::tempdir()?;
    let db_path = dir.path().join("db.ajfs");
    build_db(&db_path, dir.path(), &[])?;
    match DatabaseFile::create(&db_path, dir.path(), 0) {
        Err(AjfsError::AlreadyExists(_)) => Ok(()),
        other => panic!("expected AlreadyExists, got {other:?}"),
    }
}

#[test]
fn test_open_rejects_bad_signature() -> AjfsResult<()> {
    let dir = tempfile::tempdir()?;
    let db_path = dir.path().join("db.ajfs");
    build_db(&db_path, dir.path(), &sample_entries())?;

    let mut file = fs::OpenOptions::new().write(true).open(&db_path)?;
    file.write_all(b"NOPE")?;
    drop(file);
    match DatabaseFile::open(&db_path) {
        Err(AjfsError::InvalidFormat(_)) => Ok(()),
        other => panic!("expected InvalidFormat, got {other:?}"),
    }
}

#[test]
fn test_open_detects_checksum_mismatch() -> AjfsResult<()> {
    let dir = tempfile::tempdir()?;
    let db_path = dir.path().join("db.ajfs");
    build_db(&db_path, dir.path(), &sample_entries())?;

    // Flip one byte inside the covered span (within the lookup table).
    let mut file = fs::OpenOptions::new().read(true).write(true).open(&db_path)?;
    file.seek(SeekFrom::End(-10))?;
    let mut byte = [0u8; 1];
    file.read_exact(&mut byte)?;
    byte[0] ^= 0xff;
    file.seek(SeekFrom::Current(-1))?;
    file.write_all(&byte)?;
    drop(file);

    match DatabaseFile::open(&db_path) {
        Err(AjfsError::ChecksumMismatch { .. }) => Ok(()),
        other => panic!("expected ChecksumMismatch, got {other:?}"),
    }
}

#[test]
fn test_writer_ops_rejected_on_reader_handle() -> AjfsResult<()> {
    let dir = tempfile::tempdir()?;
    let db_path = dir.path().join("db.ajfs");
    build_db(&db_path, dir.path(), &sample_entries())?;

    let mut db = DatabaseFile::open(&db_path)?;
    match db.write_entry(&file_entry("late.txt", 1)) {
        Err(AjfsError::ModeMismatch(_)) => {}
        other => panic!("expected ModeMismatch, got {other:?}"),
    }
    db.close()
}

#[test]
fn test_hash_table_slots_and_resume() -> AjfsResult<()> {
    let dir = tempfile::tempdir()?;
    let db_path = dir.path().join("db.ajfs");
    let entries = sample_entries();
    let algorithm = HashAlgorithm::Sha1;
    // Only one of three files hashed at creation time.
    build_hashed_db(
        &db_path,
        dir.path(),
        &entries,
        algorithm,
        &[("docs/readme.md", fake_digest(0xaa, algorithm))],
    )?;

    let mut db = DatabaseFile::open(&db_path)?;
    assert!(db.has_hash_table());
    assert_eq!(Some(algorithm), db.hash_algorithm());
    assert_eq!(1, db.read_hash_table()?.len());
    db.close()?;

    // Resume sees exactly the two zeroed slots and fills them.
    let mut db = DatabaseFile::resume_database(&db_path)?;
    let mut pending = Vec::new();
    db.entries_need_hashing(|index, entry| {
        pending.push((index, entry.path));
        Ok(Visit::Continue)
    })?;
    assert_eq!(2, pending.len());
    for (index, _) in &pending {
        db.write_hash_entry(*index, &fake_digest(0xbb, algorithm))?;
        db.flush()?;
    }
    db.close()?;

    let mut db = DatabaseFile::open(&db_path)?;
    let hashes = db.read_hash_table()?;
    assert_eq!(db.file_entries_count() as usize, hashes.len());
    let mut none_pending = true;
    db.entries_need_hashing(|_, _| {
        none_pending = false;
        Ok(Visit::Continue)
    })?;
    assert!(none_pending);
    db.close()
}

#[test]
fn test_duplicate_enumeration_is_deterministic() -> AjfsResult<()> {
    let dir = tempfile::tempdir()?;
    let db_path = dir.path().join("db.ajfs");
    let entries = vec![
        dir_entry("."),
        file_entry("a.bin", 10),
        file_entry("b.bin", 10),
        file_entry("c.bin", 10),
        file_entry("unique.bin", 7),
    ];
    let algorithm = HashAlgorithm::Sha1;
    let shared = fake_digest(0x42, algorithm);
    build_hashed_db(
        &db_path,
        dir.path(),
        &entries,
        algorithm,
        &[
            ("a.bin", shared.clone()),
            ("b.bin", shared.clone()),
            ("c.bin", shared.clone()),
            ("unique.bin", fake_digest(0x99, algorithm)),
        ],
    )?;

    let mut db = DatabaseFile::open(&db_path)?;
    let buckets = db.find_duplicate_hashes()?;
    assert_eq!(1, buckets.len());
    assert_eq!(3, buckets[&shared].len());

    let mut order = Vec::new();
    db.find_duplicates(|group, _, entry, digest_hex| {
        assert_eq!(hex::encode(&shared), digest_hex);
        order.push((group, entry.path));
        Ok(Visit::Continue)
    })?;
    assert_eq!(
        vec![
            (0, "a.bin".to_string()),
            (0, "b.bin".to_string()),
            (0, "c.bin".to_string()),
        ],
        order
    );
    db.close()
}

#[test]
fn test_stats() -> AjfsResult<()> {
    let dir = tempfile::tempdir()?;
    let db_path = dir.path().join("db.ajfs");
    build_db(&db_path, dir.path(), &sample_entries())?;

    let mut db = DatabaseFile::open(&db_path)?;
    let stats = calculate_stats(&mut db)?;
    assert_eq!(3, stats.dir_count);
    assert_eq!(3, stats.file_count);
    assert!(stats.dir_count + stats.file_count <= db.entries_count() as u64);
    assert_eq!(1024 + 42 + 4096, stats.total_file_size);
    assert_eq!(4096, stats.max_file_size);
    assert_eq!(stats.total_file_size / stats.file_count, stats.avg_file_size);
    db.close()
}

#[test]
fn test_hash_table_stats() -> AjfsResult<()> {
    let dir = tempfile::tempdir()?;
    let db_path = dir.path().join("db.ajfs");
    let entries = vec![
        dir_entry("."),
        file_entry("a.bin", 100),
        file_entry("b.bin", 100),
        file_entry("c.bin", 50),
    ];
    let algorithm = HashAlgorithm::Sha256;
    let shared = fake_digest(0x11, algorithm);
    build_hashed_db(
        &db_path,
        dir.path(),
        &entries,
        algorithm,
        &[("a.bin", shared.clone()), ("b.bin", shared)],
    )?;

    let mut db = DatabaseFile::open(&db_path)?;
    let stats = calculate_hash_table_stats(&mut db)?;
    assert_eq!(2, stats.hashed_count);
    assert_eq!(1, stats.pending_count);
    assert_eq!(1, stats.duplicate_groups);
    assert_eq!(1, stats.duplicate_files);
    assert_eq!(100, stats.reclaimable_bytes);
    db.close()
}

#[test]
fn test_read_all_entries_skip_all() -> AjfsResult<()> {
    let dir = tempfile::tempdir()?;
    let db_path = dir.path().join("db.ajfs");
    build_db(&db_path, dir.path(), &sample_entries())?;

    let mut db = DatabaseFile::open(&db_path)?;
    let mut visited = 0;
    db.read_all_entries(|_, _| {
        visited += 1;
        Ok(if visited == 2 {
            Visit::SkipAll
        } else {
            Visit::Continue
        })
    })?;
    assert_eq!(2, visited);
    db.close()
}
