mod common;

use std::collections::HashMap;

use ajfs::commands::scan::{resume, scan, update, ResumeArgs, ScanArgs, UpdateArgs};
use ajfs::commands::CommonConfig;
use ajfs::common::{AjfsResult, Visit};
use ajfs::database::DatabaseFile;
use ajfs::hashing::HashAlgorithm;

use common::write_file;

fn scan_with_hashes(root: &std::path::Path, db: &std::path::Path) -> AjfsResult<()> {
    let args = ScanArgs {
        db: db.to_path_buf(),
        root: root.to_path_buf(),
        hash: true,
        algorithm: HashAlgorithm::Sha1,
        force: false,
        includes: Vec::new(),
        excludes: Vec::new(),
    };
    let mut out = Vec::new();
    scan(&args, &CommonConfig::default(), &mut out)
}

fn digests_by_path(db_path: &std::path::Path) -> AjfsResult<HashMap<String, Vec<u8>>> {
    let mut db = DatabaseFile::open(db_path)?;
    let mut digests = HashMap::new();
    db.read_entries_with_hashes(|_, entry, digest| {
        digests.insert(entry.path, digest.to_vec());
        Ok(Visit::Continue)
    })?;
    db.close()?;
    Ok(digests)
}

#[test]
fn test_update_carries_unchanged_digests() -> AjfsResult<()> {
    let dir = tempfile::tempdir()?;
    let root = dir.path().join("root");
    std::fs::create_dir(&root)?;
    write_file(&root, "stable.txt", b"does not change");
    write_file(&root, "mutating.txt", b"v1");

    let db_path = dir.path().join("db.ajfs");
    scan_with_hashes(&root, &db_path)?;
    let before = digests_by_path(&db_path)?;
    assert_eq!(2, before.len());

    // Mutate one file (different size guarantees a metadata change) and add
    // a brand new one.
    write_file(&root, "mutating.txt", b"version two, longer");
    write_file(&root, "fresh.txt", b"new content");

    let mut out = Vec::new();
    update(
        &UpdateArgs {
            db: db_path.clone(),
            force: false,
        },
        &CommonConfig::default(),
        &mut out,
    )?;

    let after = digests_by_path(&db_path)?;
    // Only the unchanged file kept its digest; the mutated and new files
    // wait for resume.
    assert_eq!(1, after.len());
    assert_eq!(before["stable.txt"], after["stable.txt"]);

    let mut db = DatabaseFile::open(&db_path)?;
    assert_eq!(3, db.file_entries_count());
    let mut pending = Vec::new();
    db.entries_need_hashing(|_, entry| {
        pending.push(entry.path);
        Ok(Visit::Continue)
    })?;
    db.close()?;
    pending.sort();
    assert_eq!(vec!["fresh.txt", "mutating.txt"], pending);

    // Resume finishes the remaining slots.
    let mut out = Vec::new();
    resume(
        &ResumeArgs {
            db: db_path.clone(),
        },
        &CommonConfig::default(),
        &mut out,
    )?;
    let complete = digests_by_path(&db_path)?;
    assert_eq!(3, complete.len());
    assert_eq!(before["stable.txt"], complete["stable.txt"]);
    assert_ne!(before["mutating.txt"], complete["mutating.txt"]);
    Ok(())
}

#[test]
fn test_update_preserves_the_entry_set() -> AjfsResult<()> {
    let dir = tempfile::tempdir()?;
    let root = dir.path().join("root");
    std::fs::create_dir(&root)?;
    write_file(&root, "a/one.txt", b"one");
    write_file(&root, "b/two.txt", b"two");

    let db_path = dir.path().join("db.ajfs");
    scan_with_hashes(&root, &db_path)?;

    std::fs::remove_file(root.join("b/two.txt"))?;
    write_file(&root, "c/three.txt", b"three");

    let mut out = Vec::new();
    update(
        &UpdateArgs {
            db: db_path.clone(),
            force: false,
        },
        &CommonConfig::default(),
        &mut out,
    )?;

    let mut db = DatabaseFile::open(&db_path)?;
    let mut paths = Vec::new();
    db.read_all_entries(|_, entry| {
        paths.push(entry.path);
        Ok(Visit::Continue)
    })?;
    db.close()?;
    paths.sort();
    assert_eq!(
        vec![".", "a", "a/one.txt", "b", "c", "c/three.txt"],
        paths
    );
    Ok(())
}
