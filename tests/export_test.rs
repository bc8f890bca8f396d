mod common;

use ajfs::common::AjfsResult;
use ajfs::database::DatabaseFile;
use ajfs::export::{export, ExportFormat};
use ajfs::hashing::HashAlgorithm;

use common::{build_db, build_hashed_db, dir_entry, fake_digest, file_entry};

fn sample() -> Vec<ajfs::path_entry::PathEntry> {
    vec![
        dir_entry("."),
        dir_entry("docs"),
        file_entry("docs/readme.md", 1024),
        file_entry("with,comma.txt", 7),
    ]
}

#[test]
fn test_csv_round_trip() -> AjfsResult<()> {
    let dir = tempfile::tempdir()?;
    let db_path = dir.path().join("db.ajfs");
    let entries = sample();
    build_db(&db_path, dir.path(), &entries)?;

    let mut db = DatabaseFile::open(&db_path)?;
    let mut out = Vec::new();
    export(&mut db, ExportFormat::Csv, &mut out)?;
    db.close()?;

    let rendered = String::from_utf8(out).expect("CSV is UTF-8");
    let mut lines = rendered.lines();
    assert_eq!(Some("Id,Size,Mode,ModTime,IsDir,Path"), lines.next());
    let rows: Vec<&str> = lines.collect();
    assert_eq!(entries.len(), rows.len());

    for (entry, row) in entries.iter().zip(&rows) {
        let columns: Vec<&str> = row.splitn(6, ',').collect();
        assert_eq!(entry.id_hex(), columns[0]);
        assert_eq!(entry.size.to_string(), columns[1]);
        assert_eq!(entry.mode.to_string(), columns[2]);
        assert_eq!(entry.is_directory().to_string(), columns[4]);
    }
    // Commas in paths are quoted.
    assert!(rendered.contains("\"with,comma.txt\""));
    Ok(())
}

#[test]
fn test_csv_includes_hash_column() -> AjfsResult<()> {
    let dir = tempfile::tempdir()?;
    let db_path = dir.path().join("db.ajfs");
    let algorithm = HashAlgorithm::Sha256;
    let digest = fake_digest(0x77, algorithm);
    build_hashed_db(
        &db_path,
        dir.path(),
        &[dir_entry("."), file_entry("a.bin", 5)],
        algorithm,
        &[("a.bin", digest.clone())],
    )?;

    let mut db = DatabaseFile::open(&db_path)?;
    let mut out = Vec::new();
    export(&mut db, ExportFormat::Csv, &mut out)?;
    db.close()?;

    let rendered = String::from_utf8(out).expect("CSV is UTF-8");
    assert!(rendered.starts_with("Id,Size,Mode,ModTime,IsDir,Hash (SHA256),Path"));
    assert!(rendered.contains(&hex::encode(&digest)));
    Ok(())
}

#[test]
fn test_json_shape() -> AjfsResult<()> {
    let dir = tempfile::tempdir()?;
    let db_path = dir.path().join("db.ajfs");
    let algorithm = HashAlgorithm::Sha1;
    build_hashed_db(
        &db_path,
        dir.path(),
        &[dir_entry("."), file_entry("a.bin", 5)],
        algorithm,
        &[("a.bin", fake_digest(0x10, algorithm))],
    )?;

    let mut db = DatabaseFile::open(&db_path)?;
    let mut out = Vec::new();
    export(&mut db, ExportFormat::Json, &mut out)?;
    db.close()?;

    let document: serde_json::Value =
        serde_json::from_slice(&out).expect("export emits valid JSON");
    let database = &document["database"];
    assert_eq!(1, database["version"]);
    assert_eq!(2, database["entriesCount"]);
    assert_eq!(1, database["fileCount"]);
    assert_eq!("sha1", database["hashTableAlgo"]);
    assert_eq!(std::env::consts::OS, database["meta"]["os"]);
    assert!(database["root"].as_str().unwrap().ends_with(
        dir.path()
            .file_name()
            .unwrap()
            .to_str()
            .unwrap()
    ));

    let entries = document["entries"].as_array().expect("entries array");
    assert_eq!(2, entries.len());
    assert_eq!(".", entries[0]["path"]);
    assert_eq!(true, entries[0]["isDir"]);
    assert_eq!("a.bin", entries[1]["path"]);
    assert_eq!(5, entries[1]["size"]);
    assert!(entries[1]["hash"].is_string());
    Ok(())
}

#[test]
fn test_hashdeep_shape() -> AjfsResult<()> {
    let dir = tempfile::tempdir()?;
    let db_path = dir.path().join("db.ajfs");
    let algorithm = HashAlgorithm::Sha1;
    let digest = fake_digest(0x44, algorithm);
    build_hashed_db(
        &db_path,
        dir.path(),
        &[dir_entry("."), file_entry("deep/file.bin", 484)],
        algorithm,
        &[("deep/file.bin", digest.clone())],
    )?;

    let mut db = DatabaseFile::open(&db_path)?;
    let mut out = Vec::new();
    export(&mut db, ExportFormat::Hashdeep, &mut out)?;
    db.close()?;

    let rendered = String::from_utf8(out).expect("hashdeep is UTF-8");
    let lines: Vec<&str> = rendered.lines().collect();
    assert_eq!("%%%% HASHDEEP-1.0", lines[0]);
    assert_eq!("%%%% size,sha1,filename", lines[1]);
    assert!(lines[2].starts_with("## "));
    assert!(rendered.contains(&format!("484,{},./deep/file.bin", hex::encode(&digest))));
    Ok(())
}

#[test]
fn test_hashdeep_requires_a_hash_table() -> AjfsResult<()> {
    let dir = tempfile::tempdir()?;
    let db_path = dir.path().join("db.ajfs");
    build_db(&db_path, dir.path(), &sample())?;

    let mut db = DatabaseFile::open(&db_path)?;
    let mut out = Vec::new();
    assert!(export(&mut db, ExportFormat::Hashdeep, &mut out).is_err());
    db.close()
}
